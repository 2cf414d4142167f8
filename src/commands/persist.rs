//! `persist` and `return`: install or remove the wrapper scripts.

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::Context;
use crate::promote::{self, ScriptPaths};
use crate::state::Session;

/// Promotes the last launched sandbox.
pub(crate) fn run(ctx: &Context) -> Result<()> {
    let session = Session::load(&ctx.layout.state)?;
    if session.last().is_none() {
        return Err(promote::nothing_launched().into());
    }
    let exe = ctx.executable()?;
    let paths = ctx.script_paths()?;

    let promoted = promote::persist(&session, &ctx.layout.home, &exe, &paths, &ctx.prompter())?;

    print!("{}", format_persisted(promoted.as_deref(), &paths));
    Ok(())
}

/// Removes the wrapper scripts, returning to the real home.
pub(crate) fn run_return(ctx: &Context) -> Result<()> {
    let paths = ctx.script_paths()?;
    let removed = promote::unpersist(&paths, &ctx.prompter())?;

    print!("{}", format_removed(&removed));
    Ok(())
}

fn format_persisted(promoted: Option<&Path>, paths: &ScriptPaths) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    let Some(sandbox) = promoted else {
        writeln!(&mut out, "{} Nothing written", "⊘".yellow()).unwrap();
        return out;
    };

    writeln!(
        &mut out,
        "{} {} is now the default home",
        "✓".green().bold(),
        sandbox.display().to_string().cyan()
    )
    .unwrap();
    writeln!(&mut out, "  Wrapper:   {}", paths.wrapper.display()).unwrap();
    writeln!(&mut out, "  Unwrapper: {}", paths.unwrapper.display()).unwrap();
    writeln!(
        &mut out,
        "  Run {} to undo",
        "play return".green()
    )
    .unwrap();

    out
}

fn format_removed(removed: &[PathBuf]) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if removed.is_empty() {
        writeln!(&mut out, "{} No wrapper scripts removed", "ℹ".blue()).unwrap();
        return out;
    }

    writeln!(&mut out, "{} Removed:", "✓".green().bold()).unwrap();
    for path in removed {
        writeln!(&mut out, "  {}", path.display()).unwrap();
    }

    out
}
