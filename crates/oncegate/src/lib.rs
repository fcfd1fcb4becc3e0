//! `oncegate`: run a callback once, once per app version, or once every
//! N days, remembering past runs in durable local storage.
//!
//! # Architecture
//!
//! ```text
//! ExecutionGate   ← applies GatePolicy, runs primary or secondary action
//!     │              holds the RecordTable in memory
//!     ▼
//! RecordStore     ← whole table as one JSON blob under one storage key
//!     │
//!     ▼
//! KeyValueBackend ← MemoryBackend | FileBackend | RedbBackend
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use oncegate::{ExecutionGate, FileBackend, RecordStore};
//!
//! let store = RecordStore::new(FileBackend::new("/var/lib/myapp"));
//! let mut gate = ExecutionGate::open(store, env!("CARGO_PKG_VERSION"))?;
//! gate.execute_once("welcome", || println!("Welcome!"))?;
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod io;
pub mod paths;
pub mod record;
pub mod store;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend, RedbBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigWarning, GateConfig, SharedBackend, StorageConfig, WarnLevel};
pub use error::{OnceError, Result};
pub use gate::{Decision, ExecutionGate, GatePolicy, SECONDS_PER_DAY};
pub use record::{ExecutionRecord, RecordTable};
pub use store::RecordStore;
