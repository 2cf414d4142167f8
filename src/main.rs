use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

mod commands;
mod config;
mod launch;
mod logging;
mod prompt;
mod promote;
mod sandbox;
mod state;
mod templates;

use commands::Context;
use config::{Config, Layout};

#[derive(Parser)]
#[command(name = "play")]
#[command(
    author,
    version,
    about = "Disposable home environments for trying out editor configurations"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: <config dir>/play/play.toml)
    #[arg(short, long, global = true, env = "PLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Provision a sandbox if needed and launch the application in it
    Checkout {
        /// Installed sandbox, preset name or repository reference
        target: String,

        /// Sandbox name (default: derived from the target)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List sandboxes and presets
    List {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },

    /// Link inherited home items into every installed sandbox
    UpdateSymlinks,

    /// Launch the last sandbox again, replacing its running process
    Restart,

    /// Make the last sandbox the default via wrapper scripts
    Persist,

    /// Remove the wrapper scripts
    Return,

    /// Show the last sandbox and its process
    Status,
}

/// Loads the configuration and starts logging into its state directory.
///
/// The returned guard flushes the log file when dropped.
fn load_context(
    config_path: &Path,
    verbose: bool,
    assume_yes: bool,
) -> Result<(Context, Option<WorkerGuard>)> {
    let config = Config::load(config_path)?;
    let layout = Layout::resolve(&config)?;
    let guard = logging::init(verbose, Some(&layout.log_dir()));
    Ok((Context::new(config, layout, assume_yes), guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path().context("Could not determine config directory")?,
    };
    let context = || load_context(&config_path, cli.verbose, cli.yes);

    match cli.command {
        Commands::Init { force } => {
            let _guard = logging::init(cli.verbose, None);
            commands::init::run(&config_path, force)?;
        }
        Commands::Checkout { target, name } => {
            let (ctx, _guard) = context()?;
            commands::checkout::run(&ctx, &target, name.as_deref()).await?;
        }
        Commands::List { json } => {
            let (ctx, _guard) = context()?;
            commands::list::run(&ctx, json)?;
        }
        Commands::UpdateSymlinks => {
            let (ctx, _guard) = context()?;
            commands::update_symlinks::run(&ctx)?;
        }
        Commands::Restart => {
            let (ctx, _guard) = context()?;
            commands::restart::run(&ctx).await?;
        }
        Commands::Persist => {
            let (ctx, _guard) = context()?;
            commands::persist::run(&ctx)?;
        }
        Commands::Return => {
            let (ctx, _guard) = context()?;
            commands::persist::run_return(&ctx)?;
        }
        Commands::Status => {
            let (ctx, _guard) = context()?;
            commands::status::run(&ctx)?;
        }
    }

    Ok(())
}
