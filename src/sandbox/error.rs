//! Domain-specific error types for sandbox lifecycle operations.
//!
//! Typed errors enable callers to match on specific failure modes
//! rather than parsing error message strings.

/// Errors that can occur while resolving, provisioning or launching a sandbox.
#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    /// Input is not an installed sandbox, a preset, or a repository reference.
    #[error("'{input}' is not an installed sandbox, a preset name, or a repository reference")]
    RecognitionFailure { input: String },

    /// Cloning or preparing a new sandbox failed. The partial directory is removed.
    #[error("Failed to provision sandbox '{name}': {message}")]
    ProvisionFailure { name: String, message: String },

    /// The operation cannot run in the current state or environment.
    #[error("{message}")]
    PreconditionFailure { message: String },

    /// A start request did not carry a repository URL.
    #[error("No repository URL given for '{name}'")]
    MissingRepoReference { name: String },
}

impl PlayError {
    /// Creates a `RecognitionFailure` error.
    pub fn unrecognized(input: impl Into<String>) -> Self {
        Self::RecognitionFailure {
            input: input.into(),
        }
    }

    /// Creates a `ProvisionFailure` error.
    pub fn provision_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProvisionFailure {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a `PreconditionFailure` error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailure {
            message: message.into(),
        }
    }

    /// Creates a `MissingRepoReference` error.
    pub fn missing_repo(name: impl Into<String>) -> Self {
        Self::MissingRepoReference { name: name.into() }
    }

    /// Returns true if this is a provisioning failure.
    pub fn is_provision_failure(&self) -> bool {
        matches!(self, Self::ProvisionFailure { .. })
    }

    /// Returns true if this is a precondition failure.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::PreconditionFailure { .. })
    }

    /// Returns true if this is a recognition failure.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::RecognitionFailure { .. })
    }

    /// Returns true if this is a missing repository reference.
    pub fn is_missing_repo(&self) -> bool {
        matches!(self, Self::MissingRepoReference { .. })
    }
}
