use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OnceError {
    #[error("application version is missing: set app_version or ONCEGATE_APP_VERSION")]
    MissingVersion,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid storage key '{0}'")]
    InvalidStorageKey(String),

    #[error("config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OnceError>;
