//! List sandboxes and presets.

use anyhow::{Context as _, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::Context;
use crate::config::RepoDescriptor;
use crate::sandbox::SandboxStore;

/// Runs the list command.
pub(crate) fn run(ctx: &Context, json: bool) -> Result<()> {
    let listing = collect(&ctx.store, &ctx.config.presets)?;

    if json {
        let out = serde_json::to_string_pretty(&listing).context("Failed to serialize listing")?;
        println!("{out}");
    } else {
        print!("{}", format_listing(&listing));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Listing {
    root: PathBuf,
    sandboxes: Vec<SandboxEntry>,
    presets: Vec<PresetEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct SandboxEntry {
    name: String,
    path: PathBuf,
    /// Whether the `config` checkout is present
    installed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct PresetEntry {
    name: String,
    repo: String,
    installed: bool,
}

fn collect(store: &SandboxStore, presets: &[RepoDescriptor]) -> Result<Listing> {
    let sandboxes = store
        .list()?
        .into_iter()
        .map(|name| SandboxEntry {
            path: store.path_for(&name),
            installed: store.is_installed(&name),
            name,
        })
        .collect();

    let presets = presets
        .iter()
        .map(|preset| {
            let name = preset.resolved_name();
            PresetEntry {
                installed: store.is_installed(&name),
                repo: preset.repo.clone(),
                name,
            }
        })
        .collect();

    Ok(Listing {
        root: store.root().to_path_buf(),
        sandboxes,
        presets,
    })
}

fn format_listing(listing: &Listing) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    writeln!(
        &mut out,
        "{} {}",
        "Sandboxes in".bold(),
        listing.root.display().to_string().cyan()
    )
    .unwrap();
    if listing.sandboxes.is_empty() {
        writeln!(&mut out, "  {}", "(none)".dimmed()).unwrap();
    }
    for sandbox in &listing.sandboxes {
        if sandbox.installed {
            writeln!(&mut out, "  {} {}", "●".green(), sandbox.name).unwrap();
        } else {
            writeln!(
                &mut out,
                "  {} {} {}",
                "○".yellow(),
                sandbox.name,
                "(no config checkout)".dimmed()
            )
            .unwrap();
        }
    }

    writeln!(&mut out, "\n{}", "Presets".bold()).unwrap();
    for preset in &listing.presets {
        let marker = if preset.installed {
            "installed".green().to_string()
        } else {
            String::new()
        };
        writeln!(
            &mut out,
            "  {:<12} {} {}",
            preset.name.cyan(),
            preset.repo.dimmed(),
            marker
        )
        .unwrap();
    }

    out
}
