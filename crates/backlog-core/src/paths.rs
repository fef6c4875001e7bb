use crate::error::{Result, StoreError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const BACKLOG_DIR: &str = ".backlog";
pub const LOCAL_DIR: &str = ".backlog/local";
pub const CONFIG_FILE: &str = ".backlog/config.yaml";
pub const REDB_FILE: &str = ".backlog/local.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn backlog_dir(root: &Path) -> PathBuf {
    root.join(BACKLOG_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn local_dir(root: &Path) -> PathBuf {
    root.join(LOCAL_DIR)
}

pub fn redb_path(root: &Path) -> PathBuf {
    root.join(REDB_FILE)
}

/// Resolve a configured path against the project root. Absolute paths are
/// returned unchanged.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

// ---------------------------------------------------------------------------
// Id validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

/// Project ids end up in file names and document URLs, so they are kept to a
/// conservative alphabet.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 128 || !id_re().is_match(id) {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        for id in ["proj_1712345678901_abc123xyz", "a", "Xk29-fa_0"] {
            validate_id(id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_ids() {
        let long = "a".repeat(129);
        for id in ["", "has spaces", "a/b", "../etc", "ünï", long.as_str()] {
            assert!(validate_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.backlog/config.yaml")
        );
        assert_eq!(local_dir(root), PathBuf::from("/tmp/proj/.backlog/local"));
        assert_eq!(
            resolve(root, Path::new("/var/data")),
            PathBuf::from("/var/data")
        );
        assert_eq!(
            resolve(root, Path::new("store")),
            PathBuf::from("/tmp/proj/store")
        );
    }
}
