//! Interactive questions: confirmations for destructive operations and
//! sandbox names that cannot be derived.

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Asks the user questions.
pub(crate) trait Prompter {
    /// Yes/no question; only an explicit yes counts.
    fn confirm(&self, question: &str) -> Result<bool>;

    /// Free-form answer, trimmed. Empty when the user gives none.
    fn ask(&self, question: &str) -> Result<String>;
}

/// Prompts on stderr and reads answers from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StdinPrompter {
    assume_yes: bool,
}

impl StdinPrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    fn read_line(question: &str) -> Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{} {} ", "?".cyan().bold(), question).context("Failed to write prompt")?;
        stderr.flush().context("Failed to write prompt")?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read answer")?;
        Ok(line.trim().to_string())
    }
}

impl Prompter for StdinPrompter {
    fn confirm(&self, question: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let answer = Self::read_line(&format!("{question} [y/N]"))?;
        Ok(is_yes(&answer))
    }

    fn ask(&self, question: &str) -> Result<String> {
        Self::read_line(question)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}
