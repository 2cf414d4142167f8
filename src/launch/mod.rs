//! Launching the application with a sandbox as its home.
//!
//! The child inherits the current environment except for `HOME`, runs in
//! its own process group and is never waited on. Its output is appended
//! to a per-sandbox log so repeated launches share one channel.

mod process;

pub(crate) use process::{start_ticks, ProcessControl, SignalControl, TerminationEvent};

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::sandbox::PlayError;
use crate::state::Session;

/// Variable overridden for every launch.
pub(crate) const HOME_VAR: &str = "HOME";

/// Channel name for a sandbox's process and output.
pub(crate) fn channel_name(name: &str) -> String {
    format!("sandbox:{name}")
}

/// Log file backing a channel.
pub(crate) fn log_file_name(name: &str) -> String {
    format!("sandbox-{name}.log")
}

/// Whether a windowed child can be shown.
///
/// On macOS a window server is always present; elsewhere an X11 or
/// Wayland display must be advertised.
pub(crate) fn supports_windowed_child<F>(var: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    if cfg!(target_os = "macos") {
        return true;
    }
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|key| var(key).is_some_and(|value| !value.is_empty()))
}

/// Locates `command` on `PATH`, ignoring candidates in `script_dir`.
///
/// A promoted wrapper shadows the real executable under the same name;
/// resolving to it would make the wrapper exec itself.
pub(crate) fn resolve_executable(command: &str, script_dir: &Path) -> Result<PathBuf> {
    let candidates = which::which_all(command)
        .with_context(|| format!("Failed to search PATH for '{command}'"))?;

    first_outside(candidates, script_dir).with_context(|| {
        format!(
            "Executable '{command}' not found on PATH (outside {})",
            script_dir.display()
        )
    })
}

fn first_outside<I>(candidates: I, dir: &Path) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let dir = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    candidates.into_iter().find(|candidate| {
        let parent = candidate
            .parent()
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf()));
        parent.as_deref() != Some(dir.as_path())
    })
}

/// Everything needed to start one application process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LaunchSpec {
    pub program: PathBuf,
    pub home: PathBuf,
    pub log_path: PathBuf,
}

/// A process that was just started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Spawned {
    pub pid: u32,
    pub start_ticks: Option<u64>,
}

/// Starts application processes.
pub(crate) trait Spawner {
    /// Starts the process without waiting for it.
    fn spawn(&self, spec: &LaunchSpec) -> Result<Spawned>;
}

/// Spawns real, detached child processes.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CommandSpawner;

impl Spawner for CommandSpawner {
    fn spawn(&self, spec: &LaunchSpec) -> Result<Spawned> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_path)
            .with_context(|| format!("Failed to open log: {}", spec.log_path.display()))?;
        let log_err = log.try_clone().context("Failed to duplicate log handle")?;

        let child = Command::new(&spec.program)
            .env(HOME_VAR, &spec.home)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .process_group(0)
            .spawn()
            .with_context(|| format!("Failed to start {}", spec.program.display()))?;

        let pid = child.id();
        Ok(Spawned {
            pid,
            start_ticks: start_ticks(pid),
        })
    }
}

/// A started application process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LaunchedProcess {
    pub name: String,
    pub channel: String,
    pub pid: u32,
    pub log_path: PathBuf,
}

/// Launches the application into sandboxes and records launches in the session.
pub(crate) struct Launcher<'a> {
    program: PathBuf,
    display_available: bool,
    log_dir: PathBuf,
    spawner: &'a dyn Spawner,
}

impl<'a> Launcher<'a> {
    pub fn new(
        program: PathBuf,
        display_available: bool,
        log_dir: PathBuf,
        spawner: &'a dyn Spawner,
    ) -> Self {
        Self {
            program,
            display_available,
            log_dir,
            spawner,
        }
    }

    /// Fails when the application could not show a window.
    pub fn check_display(&self) -> std::result::Result<(), PlayError> {
        if self.display_available {
            return Ok(());
        }
        Err(PlayError::precondition(
            "Cannot launch a windowed application: no display available \
             (set DISPLAY/WAYLAND_DISPLAY, or application.require_display = false)",
        ))
    }

    /// Starts the application with `HOME` set to `home`.
    ///
    /// On success the session's last sandbox becomes `home`; the caller
    /// persists the session.
    pub fn launch(
        &self,
        name: &str,
        home: &Path,
        session: &mut Session,
    ) -> Result<LaunchedProcess> {
        self.check_display()?;

        fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("Failed to create directory: {}", self.log_dir.display()))?;

        let channel = channel_name(name);
        let spec = LaunchSpec {
            program: self.program.clone(),
            home: home.to_path_buf(),
            log_path: self.log_dir.join(log_file_name(name)),
        };
        debug!("Launch spec: {:?}", spec);

        let Spawned { pid, start_ticks } = self.spawner.spawn(&spec)?;
        session.record_launch(name, home, &channel, pid, start_ticks);

        info!(
            event = "launch",
            sandbox = name,
            pid,
            home = %home.display(),
            "Started {}",
            self.program.display()
        );

        Ok(LaunchedProcess {
            name: name.to_string(),
            channel,
            pid,
            log_path: spec.log_path,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::cell::RefCell;

    pub(crate) use super::process::test_support::FakeControl;

    /// Records launch specs and hands out increasing pids.
    ///
    /// Each pid doubles as its start time, as `FakeControl` expects.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSpawner {
        pub spawned: RefCell<Vec<LaunchSpec>>,
    }

    impl Spawner for RecordingSpawner {
        fn spawn(&self, spec: &LaunchSpec) -> Result<Spawned> {
            let mut spawned = self.spawned.borrow_mut();
            spawned.push(spec.clone());
            let pid = 1000 + u32::try_from(spawned.len()).unwrap_or(0);
            Ok(Spawned {
                pid,
                start_ticks: Some(u64::from(pid)),
            })
        }
    }
}
