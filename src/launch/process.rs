//! Liveness checks and termination of launched processes.
//!
//! The application was started by an earlier `play` invocation, so it is
//! not our child and cannot be waited on. Termination is requested with
//! `SIGTERM` (escalating to `SIGKILL`), and a watcher task reports the
//! outcome through a one-shot channel once the process is gone.
//!
//! A recorded pid may have been reused by an unrelated process since the
//! launch. A process only counts as ours when its start time (in clock
//! ticks since boot) still matches the one captured when it was spawned.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::state::ProcessRecord;

/// How a termination request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminationEvent {
    /// The process is gone.
    Killed,
    /// The process survived `SIGKILL` for the whole grace period.
    Unresponsive,
}

/// Observes and terminates processes by pid.
pub(crate) trait ProcessControl {
    fn is_alive(&self, pid: u32) -> bool;

    /// Start time of the process currently holding `pid`.
    fn start_ticks(&self, pid: u32) -> Option<u64>;

    /// Requests termination. The receiver resolves once the outcome is known.
    fn terminate(&self, pid: u32) -> oneshot::Receiver<TerminationEvent>;

    /// True when the recorded process is still the one running under its pid.
    ///
    /// Records without a start time cannot be told apart from a reused pid
    /// and never match.
    fn is_running(&self, record: &ProcessRecord) -> bool {
        let Some(recorded) = record.start_ticks else {
            return false;
        };
        self.is_alive(record.pid) && self.start_ticks(record.pid) == Some(recorded)
    }
}

/// Signal-based control for Unix processes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SignalControl {
    grace: Duration,
    poll: Duration,
}

impl Default for SignalControl {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            poll: Duration::from_millis(50),
        }
    }
}

impl SignalControl {
    #[cfg(test)]
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            grace,
            ..Self::default()
        }
    }
}

impl ProcessControl for SignalControl {
    fn is_alive(&self, pid: u32) -> bool {
        pid_alive(pid)
    }

    fn start_ticks(&self, pid: u32) -> Option<u64> {
        start_ticks(pid)
    }

    fn terminate(&self, pid: u32) -> oneshot::Receiver<TerminationEvent> {
        let (tx, rx) = oneshot::channel();
        let Self { grace, poll } = *self;

        send_signal(pid, Signal::SIGTERM);
        tokio::spawn(async move {
            let event = watch_termination(pid, grace, poll).await;
            // The receiver may have given up; nothing left to report to.
            let _ = tx.send(event);
        });

        rx
    }
}

async fn watch_termination(pid: u32, grace: Duration, poll: Duration) -> TerminationEvent {
    if wait_for_exit(pid, grace, poll).await {
        return TerminationEvent::Killed;
    }

    debug!(pid, "Process survived SIGTERM, sending SIGKILL");
    send_signal(pid, Signal::SIGKILL);

    if wait_for_exit(pid, grace, poll).await {
        TerminationEvent::Killed
    } else {
        warn!(pid, "Process did not exit after SIGKILL");
        TerminationEvent::Unresponsive
    }
}

async fn wait_for_exit(pid: u32, timeout: Duration, poll: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !pid_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(poll).await;
    }
}

fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|&raw| raw > 0).map(Pid::from_raw)
}

fn send_signal(pid: u32, signal: Signal) {
    let Some(target) = to_pid(pid) else {
        return;
    };
    if let Err(e) = kill(target, signal) {
        debug!(pid, ?signal, error = %e, "Failed to signal process");
    }
}

/// True while the pid names a running (non-zombie) process.
fn pid_alive(pid: u32) -> bool {
    let Some(target) = to_pid(pid) else {
        return false;
    };
    match kill(target, None) {
        Ok(()) | Err(Errno::EPERM) => !is_zombie(pid),
        Err(_) => false,
    }
}

/// Start time of `pid` in clock ticks since boot, when the OS reports it.
#[cfg(target_os = "linux")]
pub(crate) fn start_ticks(pid: u32) -> Option<u64> {
    to_pid(pid)?;
    stat_field(&read_stat(pid)?, 22)?.parse().ok()
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn start_ticks(_pid: u32) -> Option<u64> {
    None
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    read_stat(pid)
        .as_deref()
        .and_then(|stat| stat_field(stat, 3))
        .is_some_and(|state| state == "Z")
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

#[cfg(target_os = "linux")]
fn read_stat(pid: u32) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()
}

/// Field `n` (1-based, as in proc(5)) of a `/proc/<pid>/stat` line.
///
/// The command name (field 2) may contain spaces and parentheses, so
/// counting starts after its closing parenthesis.
#[cfg(target_os = "linux")]
fn stat_field(stat: &str, n: usize) -> Option<&str> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().nth(n.checked_sub(3)?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Tracks a set of "live" pids; termination resolves immediately.
    ///
    /// A live pid's start time is the pid itself, matching the identities
    /// handed out by `RecordingSpawner`.
    #[derive(Debug)]
    pub(crate) struct FakeControl {
        pub alive: RefCell<HashSet<u32>>,
        pub terminated: RefCell<Vec<u32>>,
        pub event: TerminationEvent,
    }

    impl FakeControl {
        pub fn with_alive(pids: &[u32]) -> Self {
            Self {
                alive: RefCell::new(pids.iter().copied().collect()),
                terminated: RefCell::new(Vec::new()),
                event: TerminationEvent::Killed,
            }
        }
    }

    impl ProcessControl for FakeControl {
        fn is_alive(&self, pid: u32) -> bool {
            self.alive.borrow().contains(&pid)
        }

        fn start_ticks(&self, pid: u32) -> Option<u64> {
            self.is_alive(pid).then_some(u64::from(pid))
        }

        fn terminate(&self, pid: u32) -> oneshot::Receiver<TerminationEvent> {
            self.terminated.borrow_mut().push(pid);
            if self.event == TerminationEvent::Killed {
                self.alive.borrow_mut().remove(&pid);
            }
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(self.event);
            rx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(pid: u32, start_ticks: Option<u64>) -> ProcessRecord {
        ProcessRecord {
            pid,
            home: PathBuf::from("/sandboxes/prelude"),
            started_at: Utc::now(),
            start_ticks,
        }
    }

    #[test]
    fn test_invalid_pids_are_not_alive() {
        assert!(!pid_alive(0));
        assert!(!pid_alive(u32::MAX));
    }

    #[test]
    fn test_current_process_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_terminate_reports_killed() {
        let Ok(mut child) = std::process::Command::new("sleep").arg("30").spawn() else {
            return; // sleep not available
        };
        let control = SignalControl::with_grace(Duration::from_secs(2));
        assert!(control.is_alive(child.id()));

        let event = control.terminate(child.id()).await.unwrap();

        assert_eq!(event, TerminationEvent::Killed);
        let _ = child.wait();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stat_field_skips_command_name() {
        let stat = "4242 (we (ird) name) S 1 4242 4242 0 -1 4194560 \
                    100 0 0 0 1 2 0 0 20 0 1 0 987654 1000 10";
        assert_eq!(stat_field(stat, 3), Some("S"));
        assert_eq!(stat_field(stat, 4), Some("1"));
        assert_eq!(stat_field(stat, 22), Some("987654"));
        assert_eq!(stat_field(stat, 2), None);
        assert_eq!(stat_field("garbage", 3), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_start_ticks_identify_the_spawned_process() {
        let Ok(mut child) = std::process::Command::new("sleep").arg("30").spawn() else {
            return; // sleep not available
        };
        let control = SignalControl::default();
        let ticks = start_ticks(child.id());

        assert!(ticks.is_some());
        assert!(control.is_running(&record(child.id(), ticks)));
        // Same pid, different start time: a reused pid
        assert!(!control.is_running(&record(child.id(), ticks.map(|t| t + 1))));
        assert!(!control.is_running(&record(child.id(), None)));

        let _ = child.kill();
        let _ = child.wait();
        assert!(!control.is_running(&record(child.id(), ticks)));
    }

    #[test]
    fn test_fake_control_matches_recorded_identity() {
        let control = test_support::FakeControl::with_alive(&[500]);

        assert!(control.is_running(&record(500, Some(500))));
        assert!(!control.is_running(&record(500, Some(7))));
        assert!(!control.is_running(&record(500, None)));
        assert!(!control.is_running(&record(501, Some(501))));
    }
}
