//! Sandbox lifecycle: naming, storage, provisioning and inherited content.
//!
//! A sandbox is a directory under the sandbox root holding a `config`
//! checkout of a configuration repository plus links to selected items
//! of the real home. It serves as the `HOME` of a launched application.

mod error;
mod linker;
mod provision;
mod repo;
mod store;
mod target;

pub use error::PlayError;
pub use provision::CloneOptions;

pub(crate) use linker::{ContentLinker, LinkReport};
pub(crate) use provision::{GitCloner, Provisioner};
pub(crate) use repo::derive_name;
pub(crate) use store::SandboxStore;
pub(crate) use target::{resolve_target, Target};

#[cfg(test)]
pub(crate) use provision::Cloner;
