//! Embedded templates.

/// Default `play.toml` configuration.
pub(crate) const PLAY_TOML: &str = include_str!("play.toml");
