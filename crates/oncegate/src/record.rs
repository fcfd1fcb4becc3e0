//! Execution records and their on-disk encoding.
//!
//! The whole table is stored as one JSON document:
//!
//! ```text
//! { "version": 1,
//!   "records": { "<key>": { "last_executed_at": "<RFC 3339>",
//!                           "last_executed_version": "<string>" } } }
//! ```
//!
//! Field names are part of the storage format and must not change.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current blob schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// When a gate's primary action last fired, and under which app version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub last_executed_at: DateTime<Utc>,
    pub last_executed_version: String,
}

impl ExecutionRecord {
    pub fn new(last_executed_at: DateTime<Utc>, last_executed_version: impl Into<String>) -> Self {
        Self {
            last_executed_at,
            last_executed_version: last_executed_version.into(),
        }
    }
}

/// Gate identifier → record. Ordered so encoded blobs are deterministic.
pub type RecordTable = BTreeMap<String, ExecutionRecord>;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct StoredTable {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    records: RecordTable,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

/// Serialize the entire table into the storage blob.
pub fn encode(table: &RecordTable) -> Result<Vec<u8>> {
    #[derive(Serialize)]
    struct StoredTableRef<'a> {
        version: u32,
        records: &'a RecordTable,
    }
    let data = serde_json::to_vec(&StoredTableRef {
        version: SCHEMA_VERSION,
        records: table,
    })?;
    Ok(data)
}

/// Parse a storage blob back into a table.
pub fn decode(data: &[u8]) -> Result<RecordTable> {
    let stored: StoredTable = serde_json::from_slice(data)?;
    Ok(stored.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OnceError;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn encoded_blob_uses_stable_field_names() {
        let mut table = RecordTable::new();
        table.insert("welcome".into(), ExecutionRecord::new(at(0), "1.0"));
        let json: serde_json::Value = serde_json::from_slice(&encode(&table).unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        let rec = &json["records"]["welcome"];
        assert_eq!(rec["last_executed_at"], "1970-01-01T00:00:00Z");
        assert_eq!(rec["last_executed_version"], "1.0");
    }

    #[test]
    fn decode_accepts_blob_without_schema_version() {
        let blob = br#"{"records":{"k":{"last_executed_at":"2020-05-01T12:00:00Z","last_executed_version":"2.1"}}}"#;
        let table = decode(blob).unwrap();
        assert_eq!(table["k"], ExecutionRecord::new(at(1_588_334_400), "2.1"));
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let blob = br#"{"version":1,"extra":true,"records":{"k":{"last_executed_at":"1970-01-01T00:00:00Z","last_executed_version":"","note":"x"}}}"#;
        let table = decode(blob).unwrap();
        assert_eq!(table["k"].last_executed_version, "");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode(b"\x00\x01not json"), Err(OnceError::Json(_))));
    }

    #[test]
    fn decode_rejects_record_missing_a_field() {
        let blob = br#"{"records":{"k":{"last_executed_version":"1.0"}}}"#;
        assert!(decode(blob).is_err());
    }

    #[test]
    fn boundary_timestamps_roundtrip() {
        let far_future = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        let mut table = RecordTable::new();
        table.insert("epoch".into(), ExecutionRecord::new(at(0), ""));
        table.insert("future".into(), ExecutionRecord::new(far_future, "9.9.9"));
        assert_eq!(decode(&encode(&table).unwrap()).unwrap(), table);
    }

    fn record_strategy() -> impl Strategy<Value = ExecutionRecord> {
        // Years 0001..=9999, nanosecond precision.
        (-62_135_596_800i64..=253_402_300_799i64, 0u32..1_000_000_000, ".*").prop_map(
            |(secs, nanos, version)| {
                ExecutionRecord::new(Utc.timestamp_opt(secs, nanos).unwrap(), version)
            },
        )
    }

    proptest! {
        #[test]
        fn table_survives_repeated_encode_decode(
            table in proptest::collection::btree_map(".*", record_strategy(), 1..8)
        ) {
            let mut current = table.clone();
            for _ in 0..3 {
                current = decode(&encode(&current).unwrap()).unwrap();
            }
            prop_assert_eq!(current, table);
        }
    }
}
