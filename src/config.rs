use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::sandbox::{derive_name, CloneOptions};

pub(crate) const CONFIG_FILE: &str = "play.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Paths under the real home linked into every sandbox
    #[serde(default = "default_inherit")]
    pub inherit: Vec<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default = "default_presets")]
    pub presets: Vec<RepoDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inherit: default_inherit(),
            paths: PathsConfig::default(),
            application: ApplicationConfig::default(),
            git: GitConfig::default(),
            presets: default_presets(),
        }
    }
}

/// Where sandboxes, wrapper scripts and session state live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory holding one subdirectory per sandbox
    #[serde(default = "default_sandboxes")]
    pub sandboxes: String,

    /// Directory receiving the generated wrapper scripts
    #[serde(default = "default_scripts")]
    pub scripts: String,

    /// Session file and logs (default: platform state directory)
    #[serde(default)]
    pub state: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sandboxes: default_sandboxes(),
            scripts: default_scripts(),
            state: None,
        }
    }
}

/// The application launched inside sandboxes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Executable name (looked up on PATH) or path
    #[serde(default = "default_command")]
    pub command: String,

    /// Refuse to launch without a graphical display
    #[serde(default = "default_true")]
    pub require_display: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            require_display: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path to the git CLI
    #[serde(default = "default_git")]
    pub command: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            command: default_git(),
        }
    }
}

/// A configuration repository offered as a named preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDescriptor {
    /// Repository URL
    #[serde(default, alias = "url")]
    pub repo: String,

    /// Sandbox name; derived from the URL when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub options: CloneOptions,
}

impl RepoDescriptor {
    pub fn new(repo: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            repo: repo.into(),
            name: name.map(str::to_string),
            options: CloneOptions::default(),
        }
    }

    /// Explicit name if given, otherwise the name derived from the URL
    pub fn resolved_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => derive_name(&self.repo),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_inherit() -> Vec<String> {
    vec![".gnupg".to_string()]
}

fn default_sandboxes() -> String {
    "~/.emacs-play".to_string()
}

fn default_scripts() -> String {
    "~/bin".to_string()
}

fn default_command() -> String {
    "emacs".to_string()
}

fn default_git() -> String {
    "git".to_string()
}

fn default_presets() -> Vec<RepoDescriptor> {
    vec![
        RepoDescriptor::new("https://github.com/bbatsov/prelude.git", Some("prelude")),
        RepoDescriptor::new("https://github.com/syl20bnr/spacemacs.git", Some("spacemacs")),
        RepoDescriptor::new("https://github.com/doomemacs/doomemacs.git", Some("doom")),
        RepoDescriptor::new("https://github.com/purcell/emacs.d.git", None),
    ]
}

impl Config {
    /// Default location: `<config dir>/play/play.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("play").join(CONFIG_FILE))
    }

    /// Load configuration from file, using defaults if not found
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (index, preset) in self.presets.iter().enumerate() {
            if preset.resolved_name().is_empty() {
                bail!(
                    "preset #{} ({}) has no name and none can be derived from its URL",
                    index + 1,
                    if preset.repo.is_empty() { "no repo" } else { &preset.repo }
                );
            }
        }

        for item in &self.inherit {
            let path = Path::new(item);
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if item.is_empty() || escapes {
                bail!("inherited path '{item}' must be relative to the home directory");
            }
        }

        Ok(())
    }

    pub fn inherited_paths(&self) -> Vec<PathBuf> {
        self.inherit.iter().map(PathBuf::from).collect()
    }
}

/// First preset whose resolved name matches
pub(crate) fn find_preset<'a>(
    presets: &'a [RepoDescriptor],
    name: &str,
) -> Option<&'a RepoDescriptor> {
    presets.iter().find(|p| p.resolved_name() == name)
}

/// Runtime directories resolved from the config and the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    /// The real home directory
    pub home: PathBuf,
    pub sandboxes: PathBuf,
    pub scripts: PathBuf,
    pub state: PathBuf,
}

impl Layout {
    /// Resolve against the home directory from the environment.
    pub fn resolve(config: &Config) -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(Self::from_config(config, home))
    }

    pub fn from_config(config: &Config, home: PathBuf) -> Self {
        let state = match config.paths.state {
            Some(ref state) => expand_path(state, &home),
            None => dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .map_or_else(|| home.join(".local/state/play"), |dir| dir.join("play")),
        };

        Self {
            sandboxes: expand_path(&config.paths.sandboxes, &home),
            scripts: expand_path(&config.paths.scripts, &home),
            state,
            home,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state.join("logs")
    }
}

/// Expand a leading `~` against `home`
fn expand_path(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.inherit, vec![".gnupg"]);
        assert_eq!(config.application.command, "emacs");
        assert!(config.application.require_display);
        assert_eq!(config.git.command, "git");
        assert!(find_preset(&config.presets, "prelude").is_some());
        assert!(find_preset(&config.presets, "purcell").is_some());
    }

    #[test]
    fn test_prelude_preset() {
        let config = Config::default();
        let preset = find_preset(&config.presets, "prelude").unwrap();
        assert_eq!(preset.repo, "https://github.com/bbatsov/prelude.git");
        assert!(preset.options.recursive);
        assert_eq!(preset.options.depth.as_deref(), Some("1"));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
inherit = [".gnupg", ".ssh", ".config/gh"]

[paths]
sandboxes = "/srv/play"
scripts = "~/.local/bin"
state = "/tmp/play-state"

[application]
command = "/opt/emacs/bin/emacs"
require_display = false

[git]
command = "/usr/bin/git"

[[presets]]
repo = "https://github.com/bbatsov/prelude.git"
name = "prelude"

[[presets]]
url = "git@gitlab.com:me/dots.git"
name = "mine"
recursive = false
depth = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.inherit.len(), 3);
        assert_eq!(config.paths.sandboxes, "/srv/play");
        assert!(!config.application.require_display);
        assert_eq!(config.git.command, "/usr/bin/git");
        assert_eq!(config.presets.len(), 2);

        let mine = find_preset(&config.presets, "mine").unwrap();
        assert_eq!(mine.repo, "git@gitlab.com:me/dots.git");
        assert!(!mine.options.recursive);
        assert_eq!(mine.options.depth, None);
    }

    #[test]
    fn test_first_preset_wins() {
        let toml = r#"
[[presets]]
repo = "https://github.com/a/one.git"
name = "dup"

[[presets]]
repo = "https://github.com/b/two.git"
name = "dup"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            find_preset(&config.presets, "dup").unwrap().repo,
            "https://github.com/a/one.git"
        );
    }

    #[test]
    fn test_unnamed_preset_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[[presets]]\nrepo = \"https://gitlab.com/a/b.git\"\n",
        )
        .unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("has no name"));
    }

    #[test]
    fn test_escaping_inherit_path_is_rejected() {
        for bad in ["/etc", "../outside", ""] {
            let config = Config {
                inherit: vec![bad.to_string()],
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.paths.sandboxes, "~/.emacs-play");
    }

    #[test]
    fn test_layout_expands_home() {
        let mut config = Config::default();
        config.paths.state = Some("~/state".to_string());
        let layout = Layout::from_config(&config, PathBuf::from("/home/me"));

        assert_eq!(layout.sandboxes, Path::new("/home/me/.emacs-play"));
        assert_eq!(layout.scripts, Path::new("/home/me/bin"));
        assert_eq!(layout.state, Path::new("/home/me/state"));
        assert_eq!(layout.log_dir(), Path::new("/home/me/state/logs"));
    }

    #[test]
    fn test_expand_path() {
        let home = Path::new("/home/me");
        assert_eq!(expand_path("~", home), home);
        assert_eq!(expand_path("/abs", home), Path::new("/abs"));
        assert_eq!(expand_path("rel/~", home), Path::new("rel/~"));
    }
}
