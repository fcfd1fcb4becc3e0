//! Opaque key-value backends the record store writes its blob into.
//!
//! The store only needs `get`/`set`/`remove` on whole byte blobs, the way a
//! platform preferences store behaves. Three implementations ship:
//!
//! - [`MemoryBackend`]: process-local, nothing survives a restart.
//! - [`FileBackend`]: one file per key in a directory, atomically replaced.
//! - [`RedbBackend`]: a single `preferences` table in a redb database.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{OnceError, Result};
use crate::{io, paths};

/// Byte-blob storage addressed by string keys.
///
/// `set` must not return until the value is durable.
pub trait KeyValueBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Box<B> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileBackend
// ---------------------------------------------------------------------------

/// Stores each key as `<dir>/<key>.blob`.
///
/// The directory is created lazily on the first `set`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        paths::validate_storage_key(key)?;
        Ok(paths::blob_path(&self.dir, key))
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        io::read_if_exists(&self.path(key)?)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        io::atomic_write(&self.path(key)?, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        io::remove_if_exists(&self.path(key)?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RedbBackend
// ---------------------------------------------------------------------------

/// Key: storage key. Value: the opaque blob.
const PREFERENCES: TableDefinition<&str, &[u8]> = TableDefinition::new("preferences");

fn storage_err(e: impl std::fmt::Display) -> OnceError {
    OnceError::Storage(e.to_string())
}

pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// Open or create the redb database at `path`.
    ///
    /// Creates the parent directory and the `PREFERENCES` table if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(storage_err)?;
        // Ensure the table exists before any reads
        let wt = db.begin_write().map_err(storage_err)?;
        wt.open_table(PREFERENCES).map_err(storage_err)?;
        wt.commit().map_err(storage_err)?;
        Ok(Self { db })
    }
}

impl KeyValueBackend for RedbBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let rt = self.db.begin_read().map_err(storage_err)?;
        let table = rt.open_table(PREFERENCES).map_err(storage_err)?;
        let value = table.get(key).map_err(storage_err)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let wt = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = wt.open_table(PREFERENCES).map_err(storage_err)?;
            table.insert(key, value).map_err(storage_err)?;
        }
        wt.commit().map_err(storage_err)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = wt.open_table(PREFERENCES).map_err(storage_err)?;
            table.remove(key).map_err(storage_err)?;
        }
        wt.commit().map_err(storage_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
