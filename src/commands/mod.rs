//! CLI command implementations.
//!
//! Each submodule implements one `play` command: a `run` entry point doing
//! the IO, around core logic that takes its collaborators as parameters
//! so it can be tested with fakes.

pub mod checkout;
pub mod init;
pub mod list;
pub mod persist;
pub mod restart;
pub mod status;
pub mod update_symlinks;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{Config, Layout};
use crate::launch::{self, Launcher, Spawner};
use crate::prompt::StdinPrompter;
use crate::promote::ScriptPaths;
use crate::sandbox::{ContentLinker, SandboxStore};

/// Configuration and resolved locations shared by the commands.
pub(crate) struct Context {
    pub config: Config,
    pub layout: Layout,
    pub store: SandboxStore,
    pub linker: ContentLinker,
    assume_yes: bool,
}

impl Context {
    pub fn new(config: Config, layout: Layout, assume_yes: bool) -> Self {
        let store = SandboxStore::new(&layout.sandboxes);
        let linker = ContentLinker::new(&layout.home, config.inherited_paths());
        Self {
            config,
            layout,
            store,
            linker,
            assume_yes,
        }
    }

    pub fn prompter(&self) -> StdinPrompter {
        StdinPrompter::new(self.assume_yes)
    }

    /// The application executable, never one of our own wrapper scripts.
    pub fn executable(&self) -> Result<PathBuf> {
        launch::resolve_executable(&self.config.application.command, &self.layout.scripts)
    }

    /// Wrapper script locations, named after the configured command.
    ///
    /// Does not need the application to be installed.
    pub fn script_paths(&self) -> Result<ScriptPaths> {
        ScriptPaths::new(
            &self.layout.scripts,
            Path::new(&self.config.application.command),
        )
    }

    /// Whether a launch may proceed with respect to display availability.
    pub fn display_available(&self) -> bool {
        !self.config.application.require_display
            || launch::supports_windowed_child(|key| std::env::var(key).ok())
    }

    pub fn launcher<'a>(&self, spawner: &'a dyn Spawner) -> Result<Launcher<'a>> {
        Ok(Launcher::new(
            self.executable()?,
            self.display_available(),
            self.layout.log_dir(),
            spawner,
        ))
    }
}
