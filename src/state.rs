use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.toml";

/// A launched application process, keyed by its channel name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub home: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Start time reported by the OS, telling this process apart from a
    /// later one that reuses the pid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ticks: Option<u64>,
}

/// The most recently launched sandbox and the processes started for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub last_sandbox: Option<PathBuf>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub launched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processes: BTreeMap<String, ProcessRecord>,
}

impl Session {
    /// Load the session, starting empty if none was saved yet
    pub fn load(state_dir: &Path) -> Result<Self> {
        let session_path = state_dir.join(SESSION_FILE);

        if !session_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&session_path).with_context(|| {
            format!("Failed to read session file: {}", session_path.display())
        })?;

        let session: Self = toml::from_str(&content).with_context(|| {
            format!("Failed to parse session file: {}", session_path.display())
        })?;

        Ok(session)
    }

    /// Save session to file
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create directory: {}", state_dir.display()))?;

        let session_path = state_dir.join(SESSION_FILE);
        let content = toml::to_string_pretty(self).context("Failed to serialize session")?;

        fs::write(&session_path, content).with_context(|| {
            format!("Failed to write session file: {}", session_path.display())
        })?;

        Ok(())
    }

    /// Remember a successful launch
    pub fn record_launch(
        &mut self,
        name: &str,
        home: &Path,
        channel: &str,
        pid: u32,
        start_ticks: Option<u64>,
    ) {
        let now = Utc::now();
        self.last_sandbox = Some(home.to_path_buf());
        self.last_name = Some(name.to_string());
        self.launched_at = Some(now);
        self.processes.insert(
            channel.to_string(),
            ProcessRecord {
                pid,
                home: home.to_path_buf(),
                started_at: now,
                start_ticks,
            },
        );
    }

    /// Name and home of the last launched sandbox.
    ///
    /// Falls back to the directory name when only the path was recorded.
    pub fn last(&self) -> Option<(String, &Path)> {
        let home = self.last_sandbox.as_deref()?;
        let name = self.last_name.clone().or_else(|| {
            home.file_name()
                .map(|name| name.to_string_lossy().to_string())
        })?;
        Some((name, home))
    }

    pub fn process(&self, channel: &str) -> Option<&ProcessRecord> {
        self.processes.get(channel)
    }
}
