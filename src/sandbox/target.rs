//! Resolution of a user-supplied name or reference to what to start.

use crate::config::{find_preset, RepoDescriptor};

use super::error::PlayError;
use super::repo::{self, RepoReference};
use super::store::SandboxStore;

/// What a checkout request refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// A sandbox that is already provisioned.
    Installed { name: String },
    /// A configured preset, provisioned on first use.
    Preset(RepoDescriptor),
    /// A raw repository reference.
    Reference(RepoReference),
}

/// Resolves `input` against installed sandboxes, then presets, then
/// repository reference shapes.
pub(crate) fn resolve_target(
    input: &str,
    store: &SandboxStore,
    presets: &[RepoDescriptor],
) -> Result<Target, PlayError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PlayError::unrecognized(input));
    }

    if !input.contains('/') && store.is_installed(input) {
        return Ok(Target::Installed {
            name: input.to_string(),
        });
    }

    if let Some(preset) = find_preset(presets, input) {
        return Ok(Target::Preset(preset.clone()));
    }

    repo::resolve(input)
        .map(Target::Reference)
        .ok_or_else(|| PlayError::unrecognized(input))
}
