use directories::ProjectDirs;
use std::path::PathBuf;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "passdb";
pub const APP_NAME: &str = "passdb";

pub const ACTIVE_STORE_ENV: &str = "PASSDB_CACHE";
const ACTIVE_STORE_FILE: &str = "active.json";

pub fn config_dir() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("cannot determine config directory"))?;
    Ok(dirs.config_dir().to_path_buf())
}

/// Location of the file recording which store is active.
pub fn active_store_cache_path() -> anyhow::Result<PathBuf> {
    if let Ok(override_path) = std::env::var(ACTIVE_STORE_ENV) {
        return Ok(PathBuf::from(override_path));
    }
    Ok(config_dir()?.join(ACTIVE_STORE_FILE))
}
