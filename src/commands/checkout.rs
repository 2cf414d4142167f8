//! Resolve a target, provision it when needed and launch the application
//! inside it.

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, info};

use super::Context;
use crate::config::RepoDescriptor;
use crate::launch::{CommandSpawner, LaunchedProcess, Launcher};
use crate::prompt::Prompter;
use crate::sandbox::{resolve_target, GitCloner, PlayError, Provisioner, SandboxStore, Target};
use crate::state::Session;

// -----------------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------------

/// Runs the checkout command.
pub(crate) async fn run(ctx: &Context, target: &str, name: Option<&str>) -> Result<()> {
    let spawner = CommandSpawner;
    let launcher = ctx.launcher(&spawner)?;
    let cloner = GitCloner::new(&ctx.config.git.command);
    let prompter = ctx.prompter();
    let checkout = Checkout {
        store: &ctx.store,
        presets: &ctx.config.presets,
        provisioner: Provisioner::new(&ctx.store, &cloner, &ctx.linker),
        launcher: &launcher,
        prompter: &prompter,
    };

    let mut session = Session::load(&ctx.layout.state)?;
    let outcome = checkout.run(target, name, &mut session).await?;
    session.save(&ctx.layout.state)?;

    print!("{}", format_outcome(&outcome));
    Ok(())
}

// -----------------------------------------------------------------------------
// Core logic
// -----------------------------------------------------------------------------

/// What a checkout did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CheckoutOutcome {
    pub home: PathBuf,
    /// Whether the sandbox was cloned by this checkout.
    pub provisioned: bool,
    pub launched: LaunchedProcess,
}

/// Collaborators of a checkout.
pub(crate) struct Checkout<'a> {
    pub store: &'a SandboxStore,
    pub presets: &'a [RepoDescriptor],
    pub provisioner: Provisioner<'a>,
    pub launcher: &'a Launcher<'a>,
    pub prompter: &'a dyn Prompter,
}

impl Checkout<'_> {
    /// Checks out `input`: an installed sandbox, a preset name or a
    /// repository reference. `name` overrides the sandbox name of presets
    /// and references.
    pub async fn run(
        &self,
        input: &str,
        name: Option<&str>,
        session: &mut Session,
    ) -> Result<CheckoutOutcome> {
        // Fail before cloning anything that could not be shown anyway
        self.launcher.check_display()?;

        let name = name.map(str::trim).filter(|n| !n.is_empty());

        match resolve_target(input, self.store, self.presets)? {
            Target::Installed { name: installed } => {
                if name.is_some_and(|n| n != installed) {
                    debug!("Ignoring --name for installed sandbox {}", installed);
                }
                self.launch(&installed, false, session)
            }
            Target::Preset(mut descriptor) => {
                if let Some(name) = name {
                    descriptor.name = Some(name.to_string());
                }
                self.start_with_descriptor(&descriptor, session).await
            }
            Target::Reference(reference) => {
                let name = match name {
                    Some(name) => name.to_string(),
                    None if !reference.name.is_empty() => reference.name,
                    None => self.ask_name(&reference.url)?,
                };
                let descriptor = RepoDescriptor::new(reference.url, Some(&name));
                self.start_with_descriptor(&descriptor, session).await
            }
        }
    }

    /// Launches the descriptor's sandbox, provisioning it first unless it
    /// is already installed.
    pub async fn start_with_descriptor(
        &self,
        descriptor: &RepoDescriptor,
        session: &mut Session,
    ) -> Result<CheckoutOutcome> {
        let name = descriptor.resolved_name();
        if descriptor.repo.trim().is_empty() {
            return Err(PlayError::missing_repo(name).into());
        }

        if self.store.is_installed(&name) {
            info!("Sandbox {} is already installed", name);
            return self.launch(&name, false, session);
        }
        if self.store.exists(&name) {
            return Err(PlayError::provision_failed(
                &name,
                format!(
                    "{} exists but holds no configuration checkout; remove it or choose another --name",
                    self.store.path_for(&name).display()
                ),
            )
            .into());
        }

        self.provisioner
            .provision(&name, descriptor.repo.trim(), &descriptor.options)
            .await?;
        self.launch(&name, true, session)
    }

    fn launch(
        &self,
        name: &str,
        provisioned: bool,
        session: &mut Session,
    ) -> Result<CheckoutOutcome> {
        let home = self.store.path_for(name);
        let launched = self.launcher.launch(name, &home, session)?;
        Ok(CheckoutOutcome {
            home,
            provisioned,
            launched,
        })
    }

    fn ask_name(&self, url: &str) -> Result<String> {
        let answer = self
            .prompter
            .ask(&format!("No name can be derived from {url}. Sandbox name:"))?;
        if answer.is_empty() {
            bail!("No sandbox name given for {url} (use --name)");
        }
        Ok(answer)
    }
}

// -----------------------------------------------------------------------------
// Formatting
// -----------------------------------------------------------------------------

fn format_outcome(outcome: &CheckoutOutcome) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if outcome.provisioned {
        writeln!(
            &mut out,
            "{} Provisioned {}",
            "✓".green().bold(),
            outcome.home.display().to_string().cyan()
        )
        .unwrap();
    }
    writeln!(
        &mut out,
        "{} Launched {} (pid {}, {})",
        "▶".green().bold(),
        outcome.launched.name.cyan(),
        outcome.launched.pid,
        outcome.launched.channel
    )
    .unwrap();
    writeln!(
        &mut out,
        "  Output: {}",
        outcome.launched.log_path.display().to_string().dimmed()
    )
    .unwrap();

    out
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
