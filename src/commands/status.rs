use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::Context;
use crate::launch::{channel_name, ProcessControl, SignalControl};
use crate::promote::ScriptPaths;
use crate::state::Session;

pub(crate) fn run(ctx: &Context) -> Result<()> {
    let session = Session::load(&ctx.layout.state)?;
    let paths = ctx.script_paths()?;
    let status = collect(&session, &SignalControl::default(), &paths);

    print!("{}", format_status(&status));
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LastSandbox {
    name: String,
    home: PathBuf,
    channel: String,
    pid: Option<u32>,
    alive: bool,
    started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Status {
    last: Option<LastSandbox>,
    scripts: Vec<PathBuf>,
}

fn collect(session: &Session, control: &dyn ProcessControl, paths: &ScriptPaths) -> Status {
    let last = session.last().map(|(name, home)| {
        let channel = channel_name(&name);
        let record = session.process(&channel);
        LastSandbox {
            pid: record.map(|r| r.pid),
            alive: record.is_some_and(|r| control.is_running(r)),
            started_at: record.map(|r| r.started_at).or(session.launched_at),
            home: home.to_path_buf(),
            name,
            channel,
        }
    });

    Status {
        last,
        scripts: paths.existing().into_iter().map(Path::to_path_buf).collect(),
    }
}

fn format_status(status: &Status) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    let Some(ref last) = status.last else {
        writeln!(&mut out, "\n{} Nothing launched yet.", "ℹ".blue()).unwrap();
        writeln!(&mut out, "  Run {} to start one.", "play checkout <target>".green()).unwrap();
        return out;
    };

    writeln!(&mut out, "\n{}", "━".repeat(50).dimmed()).unwrap();
    writeln!(&mut out, "{}", "   Last sandbox".yellow().bold()).unwrap();
    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();

    writeln!(&mut out, "  Name:       {}", last.name.cyan()).unwrap();
    writeln!(&mut out, "  Home:       {}", last.home.display().to_string().cyan()).unwrap();
    writeln!(&mut out, "  Channel:    {}", last.channel.cyan()).unwrap();

    let process = match last.pid {
        Some(pid) if last.alive => format!("{} (pid {pid})", "running".green().bold()),
        Some(pid) => format!("{} (pid {pid})", "exited".red()),
        None => "unknown".dimmed().to_string(),
    };
    writeln!(&mut out, "  Process:    {process}").unwrap();

    if let Some(started) = last.started_at {
        writeln!(
            &mut out,
            "  Started:    {}",
            started.format("%Y-%m-%d %H:%M:%S UTC").to_string().cyan()
        )
        .unwrap();
    }

    let scripts = if status.scripts.is_empty() {
        "not persisted".dimmed().to_string()
    } else {
        status
            .scripts
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    writeln!(&mut out, "  Scripts:    {scripts}").unwrap();
    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::test_support::FakeControl;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_status_before_launch() {
        let dir = tempdir().unwrap();
        let paths = ScriptPaths::new(dir.path(), Path::new("emacs")).unwrap();

        let status = collect(&Session::default(), &FakeControl::with_alive(&[]), &paths);

        assert!(status.last.is_none());
        assert!(format_status(&status).contains("Nothing launched yet"));
    }

    #[test]
    fn test_status_reports_liveness_and_scripts() {
        let dir = tempdir().unwrap();
        let paths = ScriptPaths::new(dir.path(), Path::new("emacs")).unwrap();
        fs::write(&paths.wrapper, "#!/bin/sh\n").unwrap();
        let mut session = Session::default();
        session.record_launch("doom", Path::new("/s/doom"), "sandbox:doom", 77, Some(77));

        let status = collect(&session, &FakeControl::with_alive(&[77]), &paths);

        let last = status.last.as_ref().unwrap();
        assert_eq!(last.name, "doom");
        assert_eq!(last.pid, Some(77));
        assert!(last.alive);
        assert_eq!(status.scripts, vec![paths.wrapper.clone()]);

        let output = format_status(&status);
        assert!(output.contains("running"));
        assert!(output.contains("sandbox:doom"));
    }

    #[test]
    fn test_status_reports_exited_process() {
        let dir = tempdir().unwrap();
        let paths = ScriptPaths::new(dir.path(), Path::new("emacs")).unwrap();
        let mut session = Session::default();
        session.record_launch("doom", Path::new("/s/doom"), "sandbox:doom", 77, Some(77));

        let status = collect(&session, &FakeControl::with_alive(&[]), &paths);

        assert!(format_status(&status).contains("exited"));
        assert!(format_status(&status).contains("not persisted"));
    }

    #[test]
    fn test_status_does_not_claim_a_reused_pid() {
        let dir = tempdir().unwrap();
        let paths = ScriptPaths::new(dir.path(), Path::new("emacs")).unwrap();
        let mut session = Session::default();
        session.record_launch("doom", Path::new("/s/doom"), "sandbox:doom", 77, Some(3));

        let status = collect(&session, &FakeControl::with_alive(&[77]), &paths);

        assert!(!status.last.as_ref().unwrap().alive);
        assert!(format_status(&status).contains("exited"));
    }
}
