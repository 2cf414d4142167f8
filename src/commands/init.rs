//! Write the default configuration file.
//!
//! The core logic takes closures for filesystem operations so it can be
//! tested without touching the real config directory.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::templates;

// -----------------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------------

/// Runs the init command, writing the config template to `config_path`.
pub(crate) fn run(config_path: &Path, force: bool) -> Result<()> {
    info!("Writing configuration to {}", config_path.display());

    let file = InitFile {
        path: config_path.to_path_buf(),
        content: templates::PLAY_TOML,
        description: "Sandbox, script and preset configuration",
    };

    let result = init_config(
        &file,
        force,
        Path::exists,
        |dir| {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))
        },
        |path, content| {
            fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))
        },
    )?;

    print!("{}", format_result(&file, &result));

    Ok(())
}

// -----------------------------------------------------------------------------
// Internal types
// -----------------------------------------------------------------------------

/// File to be written during init.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InitFile {
    path: PathBuf,
    content: &'static str,
    /// Human-readable description.
    description: &'static str,
}

/// Result of attempting to write a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteResult {
    Created,
    Overwritten,
    /// Already present and `--force` not given.
    Skipped,
}

// -----------------------------------------------------------------------------
// Helper functions
// -----------------------------------------------------------------------------

/// Core init logic.
///
/// Takes closures for IO operations to enable testing:
/// - `exists`: checks if a path exists
/// - `create_dir`: creates a directory (and parents)
/// - `write_file`: writes content to a path
fn init_config<E, D, W>(
    file: &InitFile,
    force: bool,
    exists: E,
    create_dir: D,
    mut write_file: W,
) -> Result<WriteResult>
where
    E: Fn(&Path) -> bool,
    D: Fn(&Path) -> Result<()>,
    W: FnMut(&Path, &str) -> Result<()>,
{
    let existed = exists(&file.path);
    if existed && !force {
        return Ok(WriteResult::Skipped);
    }

    if let Some(dir) = file.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(dir)?;
    }
    write_file(&file.path, file.content)?;

    Ok(if existed {
        WriteResult::Overwritten
    } else {
        WriteResult::Created
    })
}

/// Formats the init result for display with colored output.
fn format_result(file: &InitFile, result: &WriteResult) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    let path = file.path.display().to_string();

    match result {
        WriteResult::Created => {
            writeln!(&mut out, "\n{} Configuration created", "✓".green().bold()).unwrap();
            writeln!(&mut out, "  {} - {}", path.cyan(), file.description).unwrap();
        }
        WriteResult::Overwritten => {
            writeln!(&mut out, "\n{} {} (overwritten)", "↻".blue(), path).unwrap();
        }
        WriteResult::Skipped => {
            writeln!(
                &mut out,
                "\n{} {} (already exists, use --force to overwrite)",
                "⊘".yellow(),
                path
            )
            .unwrap();
            return out;
        }
    }

    writeln!(&mut out, "\n{}", "Next steps:".yellow().bold()).unwrap();
    writeln!(&mut out, "  1. Edit {} to add presets", path.cyan()).unwrap();
    writeln!(
        &mut out,
        "  2. Run {} to try one",
        "play checkout <preset>".green()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  3. Run {} to make it your default",
        "play persist".green()
    )
    .unwrap();

    out
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
