use tracing::{debug, warn};

use crate::backend::KeyValueBackend;
use crate::error::Result;
use crate::paths::DEFAULT_STORAGE_KEY;
use crate::record::{self, RecordTable};

/// Durable mirror of the record table, kept as one blob under one key.
///
/// ```rust,ignore
/// let mut store = RecordStore::new(FileBackend::new(dir));
/// let mut table = store.load()?;
/// table.insert("welcome".into(), record);
/// store.save(&table)?;
/// store.clear()?;
/// ```
pub struct RecordStore<B> {
    backend: B,
    storage_key: String,
}

impl<B: KeyValueBackend> RecordStore<B> {
    /// Store under [`DEFAULT_STORAGE_KEY`].
    pub fn new(backend: B) -> Self {
        Self::with_key(backend, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(backend: B, storage_key: impl Into<String>) -> Self {
        Self {
            backend,
            storage_key: storage_key.into(),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read the stored table.
    ///
    /// A missing blob is an empty table. A blob that cannot be decoded is
    /// also an empty table, logged as a warning, and gets overwritten on the
    /// next save. Backend read failures are returned.
    pub fn load(&self) -> Result<RecordTable> {
        let Some(data) = self.backend.get(&self.storage_key)? else {
            debug!(storage_key = %self.storage_key, "no stored records");
            return Ok(RecordTable::new());
        };
        match record::decode(&data) {
            Ok(table) => {
                debug!(storage_key = %self.storage_key, records = table.len(), "loaded records");
                Ok(table)
            }
            Err(e) => {
                warn!(
                    storage_key = %self.storage_key,
                    error = %e,
                    "stored records are malformed; starting from an empty table"
                );
                Ok(RecordTable::new())
            }
        }
    }

    /// Encode and write the whole table, durable on return.
    pub fn save(&mut self, table: &RecordTable) -> Result<()> {
        let data = record::encode(table)?;
        self.backend.set(&self.storage_key, &data)?;
        debug!(storage_key = %self.storage_key, records = table.len(), "saved records");
        Ok(())
    }

    /// Remove the stored blob entirely.
    pub fn clear(&mut self) -> Result<()> {
        self.backend.remove(&self.storage_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileBackend, MemoryBackend};
    use crate::error::OnceError;
    use crate::record::ExecutionRecord;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_table() -> RecordTable {
        let mut table = RecordTable::new();
        table.insert(
            "welcome".into(),
            ExecutionRecord::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), "1.2.0"),
        );
        table.insert(
            "survey".into(),
            ExecutionRecord::new(Utc.timestamp_opt(0, 0).unwrap(), ""),
        );
        table
    }

    #[test]
    fn load_returns_empty_when_nothing_stored() {
        let store = RecordStore::new(MemoryBackend::new());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let mut store = RecordStore::new(MemoryBackend::new());
        store.save(&sample_table()).unwrap();
        assert_eq!(store.load().unwrap(), sample_table());
    }

    #[test]
    fn save_load_repeated_is_stable() {
        let mut store = RecordStore::new(MemoryBackend::new());
        store.save(&sample_table()).unwrap();
        for _ in 0..3 {
            let table = store.load().unwrap();
            store.save(&table).unwrap();
        }
        assert_eq!(store.load().unwrap(), sample_table());
    }

    #[test]
    fn malformed_blob_loads_as_empty() {
        let mut backend = MemoryBackend::new();
        backend.set(DEFAULT_STORAGE_KEY, b"{not valid").unwrap();
        let store = RecordStore::new(backend);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn clear_removes_blob() {
        let mut store = RecordStore::new(MemoryBackend::new());
        store.save(&sample_table()).unwrap();
        store.clear().unwrap();
        assert_eq!(store.backend().get(DEFAULT_STORAGE_KEY).unwrap(), None);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn custom_key_is_used() {
        let mut store = RecordStore::with_key(MemoryBackend::new(), "myapp.onboarding");
        store.save(&sample_table()).unwrap();
        assert!(store.backend().get("myapp.onboarding").unwrap().is_some());
        assert!(store.backend().get(DEFAULT_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn file_store_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = RecordStore::new(FileBackend::new(dir.path()));
            store.save(&sample_table()).unwrap();
        }
        let store = RecordStore::new(FileBackend::new(dir.path()));
        assert_eq!(store.load().unwrap(), sample_table());
    }

    #[test]
    fn invalid_key_surfaces_on_file_backend() {
        let dir = TempDir::new().unwrap();
        let mut store = RecordStore::with_key(FileBackend::new(dir.path()), "a/b");
        assert!(matches!(
            store.save(&sample_table()),
            Err(OnceError::InvalidStorageKey(_))
        ));
    }
}
