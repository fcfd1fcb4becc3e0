use crate::error::{OnceError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Storage slot the whole record table lives under.
pub const DEFAULT_STORAGE_KEY: &str = "oncegate.execution_records";

pub const STORAGE_DIR: &str = ".oncegate";
pub const REDB_FILE: &str = "records.redb";
pub const BLOB_EXTENSION: &str = "blob";

pub const VERSION_ENV: &str = "ONCEGATE_APP_VERSION";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `~/.oncegate`, used when the file backend is configured without a dir.
pub fn default_storage_dir() -> Result<PathBuf> {
    home::home_dir()
        .map(|h| h.join(STORAGE_DIR))
        .ok_or(OnceError::HomeNotFound)
}

pub fn default_redb_path() -> Result<PathBuf> {
    Ok(default_storage_dir()?.join(REDB_FILE))
}

/// File that holds the blob for `key` inside a file-backend directory.
pub fn blob_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.{BLOB_EXTENSION}"))
}

/// A storage key must be usable as a single file name.
pub fn validate_storage_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0'])
    {
        return Err(OnceError::InvalidStorageKey(key.to_string()));
    }
    Ok(())
}
