use crate::backend::{FileBackend, KeyValueBackend, MemoryBackend, RedbBackend};
use crate::error::{OnceError, Result};
use crate::gate::ExecutionGate;
use crate::paths;
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Records live only as long as the process.
    Memory,
    /// One blob file per storage key. `dir` defaults to `~/.oncegate`.
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dir: Option<PathBuf>,
    },
    /// A redb database. `path` defaults to `~/.oncegate/records.redb`.
    Redb {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File { dir: None }
    }
}

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

/// Backend chosen at runtime. `Send` so a config-built gate can sit behind a
/// host's `Mutex` and move across threads.
pub type SharedBackend = Box<dyn KeyValueBackend + Send>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Version stamped onto records. Falls back to `ONCEGATE_APP_VERSION`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_storage_key() -> String {
    paths::DEFAULT_STORAGE_KEY.to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            app_version: None,
            storage: StorageConfig::default(),
        }
    }
}

impl GateConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(OnceError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: GateConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.storage_key.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "storage_key must not be empty".to_string(),
            });
        } else if matches!(self.storage, StorageConfig::File { .. })
            && paths::validate_storage_key(&self.storage_key).is_err()
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "storage_key '{}' cannot be used as a file name",
                    self.storage_key
                ),
            });
        }

        match &self.app_version {
            Some(v) if v.trim().is_empty() => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "app_version is set but empty".to_string(),
            }),
            None => warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "app_version not set; {} must be provided at runtime",
                    paths::VERSION_ENV
                ),
            }),
            Some(_) => {}
        }

        if self.storage == StorageConfig::Memory {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "memory storage does not persist records across restarts".to_string(),
            });
        }

        warnings
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// The configured version, else `ONCEGATE_APP_VERSION`.
    pub fn resolve_version(&self) -> Result<String> {
        self.app_version
            .clone()
            .or_else(|| std::env::var(paths::VERSION_ENV).ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or(OnceError::MissingVersion)
    }

    pub fn open_backend(&self) -> Result<SharedBackend> {
        let backend: SharedBackend = match &self.storage {
            StorageConfig::Memory => Box::new(MemoryBackend::new()),
            StorageConfig::File { dir } => {
                let dir = match dir {
                    Some(d) => d.clone(),
                    None => paths::default_storage_dir()?,
                };
                Box::new(FileBackend::new(dir))
            }
            StorageConfig::Redb { path } => {
                let path = match path {
                    Some(p) => p.clone(),
                    None => paths::default_redb_path()?,
                };
                Box::new(RedbBackend::open(&path)?)
            }
        };
        Ok(backend)
    }

    /// Resolve the version, open the backend and load the stored records.
    ///
    /// The version is checked first so a misconfigured host fails before
    /// touching storage.
    pub fn open_gate(&self) -> Result<ExecutionGate<SharedBackend>> {
        let version = self.resolve_version()?;
        let store = RecordStore::with_key(self.open_backend()?, self.storage_key.clone());
        ExecutionGate::open(store, version)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
