//! Pointer to the store the CLI operates on by default.
//!
//! Only the location and display name are cached. The passphrase is never
//! written here.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStore {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
}

/// Read the cache at `cache_path`; `None` if it does not exist yet.
pub fn load_active(cache_path: &Path) -> Result<Option<ActiveStore>> {
    if !cache_path.exists() {
        return Ok(None);
    }
    let json = fs::read(cache_path)
        .with_context(|| format!("read active store cache {}", cache_path.display()))?;
    let active = serde_json::from_slice(&json)
        .with_context(|| format!("parse active store cache {}", cache_path.display()))?;
    Ok(Some(active))
}

pub fn save_active(cache_path: &Path, active: &ActiveStore) -> Result<()> {
    let dir = match cache_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(&serde_json::to_vec_pretty(active)?)?;
    staged.flush()?;
    staged
        .persist(cache_path)
        .with_context(|| format!("write active store cache {}", cache_path.display()))?;
    debug!(cache = %cache_path.display(), store = %active.path.display(), "active store updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_cache_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(load_active(&dir.path().join("active.json")).unwrap(), None);
    }

    #[test]
    fn save_then_load_overwrites() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("nested").join("active.json");
        let first = ActiveStore {
            path: PathBuf::from("/tmp/one.db"),
            name: Some("one".into()),
        };
        save_active(&cache, &first).unwrap();
        assert_eq!(load_active(&cache).unwrap(), Some(first));

        let second = ActiveStore {
            path: PathBuf::from("/tmp/two.db"),
            name: None,
        };
        save_active(&cache, &second).unwrap();
        assert_eq!(load_active(&cache).unwrap(), Some(second));
    }

    #[test]
    fn garbage_cache_is_an_error() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("active.json");
        fs::write(&cache, b"{not json").unwrap();
        assert!(load_active(&cache).is_err());
    }
}
