//! Promotion of the last sandbox to the default environment.
//!
//! Persisting writes two launchers into the script directory: one named
//! after the application that runs it inside the sandbox, and one with the
//! `-noplay` suffix that runs it with the real home. Returning removes both.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::prompt::Prompter;
use crate::sandbox::PlayError;
use crate::state::Session;

/// Suffix of the script that bypasses the promoted sandbox.
pub(crate) const UNWRAPPED_SUFFIX: &str = "-noplay";

/// Mode of both generated scripts.
const SCRIPT_MODE: u32 = 0o744;

/// Locations of the two generated scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScriptPaths {
    pub wrapper: PathBuf,
    pub unwrapper: PathBuf,
}

impl ScriptPaths {
    /// Scripts for `executable`, named after its base name.
    pub fn new(script_dir: &Path, executable: &Path) -> Result<Self> {
        let base = executable
            .file_name()
            .with_context(|| format!("No file name in {}", executable.display()))?
            .to_string_lossy();

        Ok(Self {
            wrapper: script_dir.join(base.as_ref()),
            unwrapper: script_dir.join(format!("{base}{UNWRAPPED_SUFFIX}")),
        })
    }

    pub fn existing(&self) -> Vec<&Path> {
        [self.wrapper.as_path(), self.unwrapper.as_path()]
            .into_iter()
            .filter(|p| p.symlink_metadata().is_ok())
            .collect()
    }
}

/// `#!/bin/sh` script running `exe` with `HOME` set to `home`.
pub(crate) fn render_script(home: &Path, exe: &Path) -> String {
    let home = shell_words::quote(&home.to_string_lossy()).into_owned();
    let exe = shell_words::quote(&exe.to_string_lossy()).into_owned();
    format!("#!/bin/sh\nHOME={home} exec {exe} \"$@\"\n")
}

pub(crate) fn nothing_launched() -> PlayError {
    PlayError::precondition("Nothing launched yet; run `play checkout` first")
}

/// Writes the wrapper pair for the last launched sandbox.
///
/// Returns `None` when the user declines.
pub(crate) fn persist(
    session: &Session,
    original_home: &Path,
    exe: &Path,
    paths: &ScriptPaths,
    prompter: &dyn Prompter,
) -> Result<Option<PathBuf>> {
    let Some((name, sandbox)) = session.last() else {
        return Err(nothing_launched().into());
    };

    let question = format!(
        "Make '{name}' the default for {} (writes {})?",
        exe.display(),
        paths.wrapper.display()
    );
    if !prompter.confirm(&question)? {
        debug!("Persist declined");
        return Ok(None);
    }

    if let Some(dir) = paths.wrapper.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    write_script(&paths.wrapper, &render_script(sandbox, exe))?;
    write_script(&paths.unwrapper, &render_script(original_home, exe))?;

    info!(
        event = "persist",
        sandbox = %name,
        wrapper = %paths.wrapper.display(),
        "Promoted sandbox"
    );
    Ok(Some(sandbox.to_path_buf()))
}

/// Removes the wrapper pair. Absent scripts are not an error.
///
/// Returns the scripts actually removed; confirmation is only asked when
/// there is something to remove.
pub(crate) fn unpersist(paths: &ScriptPaths, prompter: &dyn Prompter) -> Result<Vec<PathBuf>> {
    let existing: Vec<PathBuf> = paths.existing().into_iter().map(Path::to_path_buf).collect();
    if existing.is_empty() {
        return Ok(existing);
    }

    let listing = existing
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if !prompter.confirm(&format!("Remove {listing}?"))? {
        debug!("Return declined");
        return Ok(Vec::new());
    }

    for path in &existing {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
            }
        }
    }

    info!(event = "return", removed = existing.len(), "Removed wrapper scripts");
    Ok(existing)
}

fn write_script(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(SCRIPT_MODE))
        .with_context(|| format!("Failed to make {} executable", path.display()))
}
