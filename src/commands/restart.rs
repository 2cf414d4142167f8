//! Restart the most recently launched sandbox.

use anyhow::{bail, Context as _, Result};
use colored::Colorize;
use tracing::info;

use super::Context;
use crate::launch::{
    channel_name, CommandSpawner, LaunchedProcess, Launcher, ProcessControl, SignalControl,
    TerminationEvent,
};
use crate::prompt::Prompter;
use crate::sandbox::PlayError;
use crate::state::Session;

/// Runs the restart command.
pub(crate) async fn run(ctx: &Context) -> Result<()> {
    let mut session = Session::load(&ctx.layout.state)?;
    if session.last().is_none() {
        return Err(nothing_run_yet().into());
    }

    let spawner = CommandSpawner;
    let launcher = ctx.launcher(&spawner)?;
    let control = SignalControl::default();
    let prompter = ctx.prompter();

    let outcome = start_last(&mut session, &launcher, &control, &prompter).await?;
    session.save(&ctx.layout.state)?;

    print!("{}", format_outcome(&outcome));
    Ok(())
}

fn nothing_run_yet() -> PlayError {
    PlayError::precondition("Nothing run yet; run `play checkout` first")
}

/// What a restart did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RestartOutcome {
    /// Nothing was running; the sandbox was launched.
    Launched(LaunchedProcess),
    /// The running process was killed and the sandbox launched again.
    Relaunched {
        killed: u32,
        launched: LaunchedProcess,
    },
    /// The user chose to keep the running process.
    Declined { pid: u32 },
}

/// Launches the last sandbox again, replacing its running process after
/// confirmation.
pub(crate) async fn start_last(
    session: &mut Session,
    launcher: &Launcher<'_>,
    control: &dyn ProcessControl,
    prompter: &dyn Prompter,
) -> Result<RestartOutcome> {
    let Some((name, home)) = session.last().map(|(name, home)| (name, home.to_path_buf())) else {
        return Err(nothing_run_yet().into());
    };

    let channel = channel_name(&name);
    let running = session
        .process(&channel)
        .filter(|record| control.is_running(record))
        .map(|record| record.pid);

    let Some(pid) = running else {
        let launched = launcher.launch(&name, &home, session)?;
        return Ok(RestartOutcome::Launched(launched));
    };

    if !prompter.confirm(&format!("'{name}' is running (pid {pid}). Kill it and restart?"))? {
        return Ok(RestartOutcome::Declined { pid });
    }

    let event = control
        .terminate(pid)
        .await
        .context("Termination watcher exited without reporting")?;
    if event != TerminationEvent::Killed {
        bail!("Process {pid} did not exit; '{name}' was not restarted");
    }
    info!(event = "killed", sandbox = %name, pid, "Stopped running sandbox");

    let launched = launcher.launch(&name, &home, session)?;
    Ok(RestartOutcome::Relaunched {
        killed: pid,
        launched,
    })
}

fn format_outcome(outcome: &RestartOutcome) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    match outcome {
        RestartOutcome::Launched(launched) => {
            writeln!(
                &mut out,
                "{} Launched {} (pid {})",
                "▶".green().bold(),
                launched.name.cyan(),
                launched.pid
            )
            .unwrap();
        }
        RestartOutcome::Relaunched { killed, launched } => {
            writeln!(
                &mut out,
                "{} Stopped pid {} and relaunched {} (pid {})",
                "↻".blue().bold(),
                killed,
                launched.name.cyan(),
                launched.pid
            )
            .unwrap();
        }
        RestartOutcome::Declined { pid } => {
            writeln!(
                &mut out,
                "{} Left pid {} running",
                "⊘".yellow(),
                pid
            )
            .unwrap();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::test_support::{FakeControl, RecordingSpawner};
    use crate::prompt::test_support::FakePrompter;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn launched_session() -> Session {
        let mut session = Session::default();
        session.record_launch(
            "prelude",
            Path::new("/sandboxes/prelude"),
            "sandbox:prelude",
            500,
            Some(500),
        );
        session
    }

    #[tokio::test]
    async fn test_restart_before_any_launch_fails() {
        let logs = tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let launcher = Launcher::new(PathBuf::from("emacs"), true, logs.path().into(), &spawner);
        let mut session = Session::default();

        let err = start_last(
            &mut session,
            &launcher,
            &FakeControl::with_alive(&[]),
            &FakePrompter::yes(),
        )
        .await
        .unwrap_err();

        assert!(err.downcast_ref::<PlayError>().unwrap().is_precondition());
        assert!(spawner.spawned.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_restart_without_live_process_launches_last_home() {
        let logs = tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let launcher = Launcher::new(PathBuf::from("emacs"), true, logs.path().into(), &spawner);
        let prompter = FakePrompter::no();
        let mut session = launched_session();

        let outcome = start_last(
            &mut session,
            &launcher,
            &FakeControl::with_alive(&[]),
            &prompter,
        )
        .await
        .unwrap();

        let RestartOutcome::Launched(launched) = outcome else {
            panic!("expected a plain launch");
        };
        assert_eq!(launched.name, "prelude");
        assert_eq!(
            spawner.spawned.borrow()[0].home,
            Path::new("/sandboxes/prelude")
        );
        assert!(prompter.asked.borrow().is_empty());
        assert_eq!(session.process("sandbox:prelude").unwrap().pid, launched.pid);
    }

    #[tokio::test]
    async fn test_restart_kills_then_relaunches() {
        let logs = tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let launcher = Launcher::new(PathBuf::from("emacs"), true, logs.path().into(), &spawner);
        let control = FakeControl::with_alive(&[500]);
        let mut session = launched_session();

        let outcome = start_last(&mut session, &launcher, &control, &FakePrompter::yes())
            .await
            .unwrap();

        assert!(matches!(outcome, RestartOutcome::Relaunched { killed: 500, .. }));
        assert_eq!(*control.terminated.borrow(), vec![500]);
        assert_eq!(spawner.spawned.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_declined_restart_leaves_process_running() {
        let logs = tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let launcher = Launcher::new(PathBuf::from("emacs"), true, logs.path().into(), &spawner);
        let control = FakeControl::with_alive(&[500]);
        let mut session = launched_session();

        let outcome = start_last(&mut session, &launcher, &control, &FakePrompter::no())
            .await
            .unwrap();

        assert_eq!(outcome, RestartOutcome::Declined { pid: 500 });
        assert!(control.terminated.borrow().is_empty());
        assert!(control.is_alive(500));
        assert!(spawner.spawned.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_unresponsive_process_is_not_relaunched() {
        let logs = tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let launcher = Launcher::new(PathBuf::from("emacs"), true, logs.path().into(), &spawner);
        let control = FakeControl {
            event: TerminationEvent::Unresponsive,
            ..FakeControl::with_alive(&[500])
        };
        let mut session = launched_session();

        let err = start_last(&mut session, &launcher, &control, &FakePrompter::yes())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("did not exit"));
        assert!(spawner.spawned.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_reused_pid_is_not_terminated() {
        let logs = tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let launcher = Launcher::new(PathBuf::from("emacs"), true, logs.path().into(), &spawner);
        let control = FakeControl::with_alive(&[500]);
        let mut session = Session::default();
        // Pid 500 is alive, but it started after the recorded launch
        session.record_launch(
            "prelude",
            Path::new("/sandboxes/prelude"),
            "sandbox:prelude",
            500,
            Some(7),
        );

        let outcome = start_last(&mut session, &launcher, &control, &FakePrompter::yes())
            .await
            .unwrap();

        assert!(matches!(outcome, RestartOutcome::Launched(_)));
        assert!(control.terminated.borrow().is_empty());
        assert_eq!(spawner.spawned.borrow().len(), 1);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_restart_leaves_unrelated_process_alone() {
        let Ok(mut stranger) = std::process::Command::new("sleep").arg("30").spawn() else {
            return; // sleep not available
        };
        let Some(ticks) = crate::launch::start_ticks(stranger.id()) else {
            let _ = stranger.kill();
            let _ = stranger.wait();
            return;
        };
        let logs = tempdir().unwrap();
        let spawner = RecordingSpawner::default();
        let launcher = Launcher::new(PathBuf::from("emacs"), true, logs.path().into(), &spawner);
        let control = SignalControl::with_grace(std::time::Duration::from_secs(2));
        // The sandbox's process held this pid earlier and has since exited
        let mut session = Session::default();
        session.record_launch(
            "prelude",
            Path::new("/sandboxes/prelude"),
            "sandbox:prelude",
            stranger.id(),
            Some(ticks + 1),
        );

        let outcome = start_last(&mut session, &launcher, &control, &FakePrompter::yes())
            .await
            .unwrap();

        let still_running = matches!(stranger.try_wait(), Ok(None));
        let _ = stranger.kill();
        let _ = stranger.wait();
        assert!(matches!(outcome, RestartOutcome::Launched(_)));
        assert!(still_running);
    }

    #[test]
    fn test_format_declined() {
        let output = format_outcome(&RestartOutcome::Declined { pid: 9 });
        assert!(output.contains("pid 9"));
    }
}
