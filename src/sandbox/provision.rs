//! Provisioning: clone a configuration repository into a fresh sandbox.
//!
//! A sandbox directory only survives provisioning when the clone and the
//! inherited links both succeed. Any failure after the directory was
//! created removes it again, so a half-cloned sandbox is never mistaken
//! for an installed one.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::PlayError;
use super::linker::ContentLinker;
use super::store::{SandboxStore, CONFIG_DIR};

/// Options passed to the clone command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneOptions {
    /// Clone submodules recursively
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Shallow clone depth; `false` in config requests a full clone
    #[serde(default = "default_depth", deserialize_with = "deserialize_depth")]
    pub depth: Option<String>,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            depth: default_depth(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_depth() -> Option<String> {
    Some("1".to_string())
}

/// Accepts `depth = 3`, `depth = "3"` or `depth = false`.
fn deserialize_depth<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDepth {
        Flag(bool),
        Number(u64),
        Text(String),
    }

    Ok(match RawDepth::deserialize(deserializer)? {
        RawDepth::Flag(false) => None,
        RawDepth::Flag(true) => default_depth(),
        RawDepth::Number(n) => Some(n.to_string()),
        RawDepth::Text(s) if s.trim().is_empty() => None,
        RawDepth::Text(s) => Some(s.trim().to_string()),
    })
}

/// Runs the version-control clone.
#[async_trait]
pub(crate) trait Cloner: Send + Sync {
    /// Clones `url` into `target`, which must not exist yet.
    async fn clone_repo(&self, url: &str, target: &Path, options: &CloneOptions) -> Result<()>;
}

/// Clones with the `git` command line client.
#[derive(Debug, Clone)]
pub(crate) struct GitCloner {
    command: String,
}

impl GitCloner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// `clone [--recursive] [--depth=N] <url> <target>`
    pub fn clone_args(url: &str, target: &Path, options: &CloneOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["clone".into()];
        if options.recursive {
            args.push("--recursive".into());
        }
        if let Some(ref depth) = options.depth {
            args.push(format!("--depth={depth}").into());
        }
        args.push(url.into());
        args.push(target.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl Cloner for GitCloner {
    async fn clone_repo(&self, url: &str, target: &Path, options: &CloneOptions) -> Result<()> {
        let args = Self::clone_args(url, target, options);
        debug!("Running {} {:?}", self.command, args);

        let output = tokio::process::Command::new(&self.command)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run '{}'", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git clone {url} failed ({}): {}", output.status, stderr.trim());
        }
        Ok(())
    }
}

/// Sandbox directory created by the current attempt, removed on drop
/// unless the attempt completed.
struct PartialSandbox {
    path: PathBuf,
    armed: bool,
}

impl PartialSandbox {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialSandbox {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!("Removing partial sandbox {}", self.path.display());
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove partial sandbox"
            );
        }
    }
}

/// Creates, clones and links new sandboxes.
pub(crate) struct Provisioner<'a> {
    store: &'a SandboxStore,
    cloner: &'a dyn Cloner,
    linker: &'a ContentLinker,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        store: &'a SandboxStore,
        cloner: &'a dyn Cloner,
        linker: &'a ContentLinker,
    ) -> Self {
        Self {
            store,
            cloner,
            linker,
        }
    }

    /// Provisions sandbox `name` from `url`.
    ///
    /// The sandbox directory is created with a plain `mkdir`: if another
    /// process got there first, this attempt fails and leaves the
    /// existing directory alone.
    pub async fn provision(
        &self,
        name: &str,
        url: &str,
        options: &CloneOptions,
    ) -> std::result::Result<PathBuf, PlayError> {
        validate_name(name).map_err(|e| PlayError::provision_failed(name, e.to_string()))?;

        let root = self.store.root();
        fs::create_dir_all(root).map_err(|e| {
            PlayError::provision_failed(name, format!("cannot create {}: {e}", root.display()))
        })?;

        let path = self.store.path_for(name);
        fs::create_dir(&path).map_err(|e| {
            PlayError::provision_failed(name, format!("cannot create {}: {e}", path.display()))
        })?;
        let guard = PartialSandbox::new(path.clone());

        info!("Cloning {} into {}", url, path.display());
        self.cloner
            .clone_repo(url, &path.join(CONFIG_DIR), options)
            .await
            .map_err(|e| PlayError::provision_failed(name, format!("{e:#}")))?;

        self.linker
            .link_inherited(&path)
            .map_err(|e| PlayError::provision_failed(name, format!("{e:#}")))?;

        let path = guard.disarm();
        info!("Sandbox {} is ready", name);
        Ok(path)
    }
}

/// A sandbox name must be a single, non-hidden path component.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("sandbox name is empty");
    }
    if name.starts_with('.') || name.contains('/') || name.contains('\\') {
        bail!("'{name}' is not a valid sandbox name");
    }
    Ok(())
}
