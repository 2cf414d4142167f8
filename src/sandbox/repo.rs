//! Repository reference recognition and normalization.
//!
//! Accepts the shapes a user is likely to type when asking for a
//! configuration repository:
//! - scp-like shorthand: `git@host:path/to/repo.git`
//! - URLs: `ssh://`, `git://`, `http(s)://`, `file://` ending in `.git`
//! - GitHub shorthand: `owner/repo`
//! - local bare repositories (`*.git` directories) and working trees

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SCP_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]+@[A-Za-z0-9.-]+:[A-Za-z0-9._/~-]+\.git$")
        .expect("scp-like pattern is valid")
});

static GIT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:ssh|git|https?|file)://\S+\.git/?$").expect("git URL pattern is valid")
});

static GITHUB_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z0-9_.-]+)/([a-z0-9_.-]+)$").expect("shorthand pattern is valid")
});

static GITHUB_SSH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^git@github\.com:([a-z0-9_.-]+)/([a-z0-9_.-]+?)(?:\.git)?/?$")
        .expect("GitHub SSH pattern is valid")
});

static GITHUB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://|ssh://git@|git://)github\.com/([a-z0-9_.-]+)/([a-z0-9_.-]+?)(?:\.git)?/?$")
        .expect("GitHub URL pattern is valid")
});

/// A recognized repository reference, normalized to something `git clone` accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepoReference {
    /// Cloneable URL or local path.
    pub url: String,
    /// Derived sandbox name, empty when none could be derived.
    pub name: String,
}

/// Returns true if `s` plausibly names a cloneable git repository.
pub(crate) fn recognize(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    SCP_LIKE.is_match(s)
        || GIT_URL.is_match(s)
        || bare_shorthand(s).is_some()
        || is_local_repository(Path::new(s))
}

/// Extracts the canonical `owner/repo` segment from a GitHub reference.
///
/// Accepts bare shorthand, SSH-style and HTTPS URLs, with or without `.git`.
pub(crate) fn parse_github_shorthand(url: &str) -> Option<String> {
    let url = url.trim();
    if let Some(caps) = GITHUB_SSH.captures(url).or_else(|| GITHUB_URL.captures(url)) {
        return Some(format!("{}/{}", &caps[1], &caps[2]));
    }
    bare_shorthand(url).map(|(owner, repo)| format!("{owner}/{repo}"))
}

/// Builds the canonical HTTPS clone URL for an `owner/repo` slug.
pub(crate) fn to_https_url(slug: &str) -> String {
    format!("https://github.com/{slug}.git")
}

/// Derives a sandbox name (the repository owner) from a URL.
///
/// Returns an empty string when the URL is not a GitHub reference; the
/// caller then has to ask for an explicit name.
pub(crate) fn derive_name(url: &str) -> String {
    parse_github_shorthand(url)
        .and_then(|slug| slug.split('/').next().map(str::to_string))
        .unwrap_or_default()
}

/// Normalizes a repository reference.
///
/// Local repositories that exist on disk win over the GitHub shorthand,
/// which in turn wins over the generic URL forms because it also yields
/// a name.
pub(crate) fn resolve(s: &str) -> Option<RepoReference> {
    let s = s.trim();
    let path = Path::new(s);

    if is_local_repository(path) {
        let url = std::fs::canonicalize(path)
            .unwrap_or_else(|_| PathBuf::from(s))
            .display()
            .to_string();
        return Some(RepoReference {
            url,
            name: String::new(),
        });
    }

    if let Some(slug) = parse_github_shorthand(s) {
        return Some(RepoReference {
            url: to_https_url(&slug),
            name: derive_name(&slug),
        });
    }

    if recognize(s) {
        return Some(RepoReference {
            url: s.to_string(),
            name: String::new(),
        });
    }

    None
}

/// Splits `owner/repo` shorthand, dropping a trailing `.git`.
fn bare_shorthand(s: &str) -> Option<(String, String)> {
    let caps = GITHUB_SHORTHAND.captures(s)?;
    let owner = &caps[1];
    let repo = caps[2].strip_suffix(".git").unwrap_or(&caps[2]);

    // `./x` and `../x` are relative paths, not owners
    if is_dots(owner) || repo.is_empty() || is_dots(repo) {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

fn is_dots(segment: &str) -> bool {
    segment.chars().all(|c| c == '.')
}

/// A bare repository directory (`*.git`) or a working tree with a `.git` entry.
fn is_local_repository(path: &Path) -> bool {
    let bare = path.extension().is_some_and(|ext| ext == "git") && path.is_dir();
    bare || path.join(".git").is_dir()
}
