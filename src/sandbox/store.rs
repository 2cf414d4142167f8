//! Sandbox directories under the sandbox root.
//!
//! The filesystem is the only record of which sandboxes exist: a sandbox
//! is a directory named after it, and it is installed once its `config`
//! working tree is in place.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory of a sandbox holding the cloned configuration.
pub(crate) const CONFIG_DIR: &str = "config";

/// Maps sandbox names to directories under a root.
#[derive(Debug, Clone)]
pub(crate) struct SandboxStore {
    root: PathBuf,
}

impl SandboxStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `name`, whether or not it exists.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_dir()
    }

    /// True once the sandbox directory carries its `config` working tree.
    pub fn is_installed(&self, name: &str) -> bool {
        self.path_for(name).join(CONFIG_DIR).is_dir()
    }

    /// Every non-hidden subdirectory of the root.
    pub fn list(&self) -> Result<BTreeSet<String>> {
        if !self.root.is_dir() {
            return Ok(BTreeSet::new());
        }

        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read {}", self.root.display()))?;

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if entry.path().is_dir() {
                names.insert(name);
            }
        }
        Ok(names)
    }

    /// Subset of [`Self::list`] that carries the `config` marker.
    pub fn installed(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|name| self.is_installed(name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_path_for_is_pure() {
        let store = SandboxStore::new("/sandboxes");
        assert_eq!(store.path_for("prelude"), Path::new("/sandboxes/prelude"));
        assert!(!store.exists("prelude"));
    }

    #[test]
    fn test_list_missing_root() {
        let dir = tempdir().unwrap();
        let store = SandboxStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_dotfiles_and_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("prelude")).unwrap();
        fs::create_dir(dir.path().join("spacemacs")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let store = SandboxStore::new(dir.path());
        let names: Vec<_> = store.list().unwrap().into_iter().collect();
        assert_eq!(names, vec!["prelude", "spacemacs"]);
    }

    #[test]
    fn test_installed_requires_config_marker() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("prelude").join(CONFIG_DIR)).unwrap();
        fs::create_dir(dir.path().join("stray")).unwrap();

        let store = SandboxStore::new(dir.path());
        assert!(store.exists("stray"));
        assert!(!store.is_installed("stray"));
        assert!(store.is_installed("prelude"));

        let installed: Vec<_> = store.installed().unwrap().into_iter().collect();
        assert_eq!(installed, vec!["prelude"]);
    }
}
