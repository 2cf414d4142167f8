//! Re-apply inherited links to every installed sandbox.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::sandbox::LinkReport;

pub(crate) fn run(ctx: &Context) -> Result<()> {
    let results = ctx.linker.link_all(&ctx.store)?;
    print!("{}", format_results(&results));
    Ok(())
}

fn format_results(results: &[(String, LinkReport)]) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if results.is_empty() {
        writeln!(&mut out, "{} No installed sandboxes", "ℹ".blue()).unwrap();
        return out;
    }

    for (name, report) in results {
        if report.linked.is_empty() {
            writeln!(&mut out, "  {} {} up to date", "✓".green(), name).unwrap();
            continue;
        }
        let linked = report
            .linked
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            &mut out,
            "  {} {} linked {}",
            "+".green().bold(),
            name.cyan(),
            linked
        )
        .unwrap();
    }

    out
}
