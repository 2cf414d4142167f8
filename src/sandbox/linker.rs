//! Inherited content: real-home items made visible inside sandboxes.
//!
//! Items are symlinked, never copied, so changes in the real home show up
//! live in every sandbox. Linking is best-effort and safe to repeat.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::store::SandboxStore;

/// Outcome of linking one sandbox.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct LinkReport {
    /// Links created by this run.
    pub linked: Vec<PathBuf>,
    /// Items already present in the sandbox (left untouched).
    pub present: Vec<PathBuf>,
    /// Items with no source in the real home.
    pub missing: Vec<PathBuf>,
}

/// Links a fixed set of relative paths from the real home into sandboxes.
#[derive(Debug, Clone)]
pub(crate) struct ContentLinker {
    home: PathBuf,
    inherit: Vec<PathBuf>,
}

impl ContentLinker {
    pub fn new(home: impl Into<PathBuf>, inherit: Vec<PathBuf>) -> Self {
        Self {
            home: home.into(),
            inherit,
        }
    }

    /// Links every inherited item into `sandbox`.
    ///
    /// Never overwrites an existing path (a dangling link counts as
    /// existing) and never fails because a source is absent.
    pub fn link_inherited(&self, sandbox: &Path) -> Result<LinkReport> {
        let mut report = LinkReport::default();

        for rel in &self.inherit {
            let src = self.home.join(rel);
            let dst = sandbox.join(rel);

            if dst.symlink_metadata().is_ok() {
                report.present.push(rel.clone());
                continue;
            }
            if !src.exists() {
                debug!("Skipping {}: not present in {}", rel.display(), self.home.display());
                report.missing.push(rel.clone());
                continue;
            }

            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            std::os::unix::fs::symlink(&src, &dst).with_context(|| {
                format!("Failed to link {} -> {}", dst.display(), src.display())
            })?;

            debug!("Linked {} -> {}", dst.display(), src.display());
            report.linked.push(rel.clone());
        }

        Ok(report)
    }

    /// Re-applies [`Self::link_inherited`] to every installed sandbox.
    ///
    /// Directories without a `config` working tree are not sandboxes and
    /// are left alone.
    pub fn link_all(&self, store: &SandboxStore) -> Result<Vec<(String, LinkReport)>> {
        let mut results = Vec::new();

        let installed = store.installed()?;
        for name in store.list()?.difference(&installed) {
            debug!("Skipping {name}: no configuration checkout");
        }

        for name in installed {
            let report = self.link_inherited(&store.path_for(&name))?;
            if !report.linked.is_empty() {
                info!("Linked {} item(s) into {}", report.linked.len(), name);
            }
            debug!(
                sandbox = %name,
                present = report.present.len(),
                missing = report.missing.len(),
                "Inherited content checked"
            );
            results.push((name, report));
        }

        Ok(results)
    }
}
