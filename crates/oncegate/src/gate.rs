//! The execution gate: decides whether a gated action fires again.
//!
//! Each call names a gate by key and supplies a [`GatePolicy`]. The gate
//! looks up the last time that key's primary action fired and either runs
//! the primary action (and records the firing) or the secondary one.
//!
//! ```rust,ignore
//! let store = RecordStore::new(FileBackend::new(dir));
//! let mut gate = ExecutionGate::open(store, env!("CARGO_PKG_VERSION"))?;
//!
//! gate.execute_once("welcome", || show_welcome())?;
//! gate.execute_once_per_version_or("whats-new", || show_changelog(), || {})?;
//! gate.execute_once_per_interval("survey", 7.0, || ask_for_feedback())?;
//! ```
//!
//! `run_gated` and `reset` borrow the gate mutably, so an action cannot call
//! back into the gate that is running it. Hosts sharing a gate across threads
//! wrap it in their own `Mutex`.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backend::KeyValueBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{OnceError, Result};
use crate::record::{ExecutionRecord, RecordTable};
use crate::store::RecordStore;

/// Length of a "day" for interval gating, in seconds.
///
/// 84 600, not 86 400. Changing it shifts when already-recorded interval
/// gates reopen.
pub const SECONDS_PER_DAY: f64 = 84_600.0;

// ---------------------------------------------------------------------------
// GatePolicy
// ---------------------------------------------------------------------------

/// How a single gated call decides whether it is already satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct GatePolicy {
    /// Caller-chosen identifier, unique per gated call site.
    pub key: String,
    /// Fire again whenever the app version differs from the recorded one.
    pub per_version: bool,
    /// Fire again once this many days have passed. `0` disables expiry.
    pub every_x_days: f64,
}

impl GatePolicy {
    pub fn new(key: impl Into<String>, per_version: bool, every_x_days: f64) -> Self {
        Self {
            key: key.into(),
            per_version,
            every_x_days,
        }
    }

    /// Fire once, ever.
    pub fn once(key: impl Into<String>) -> Self {
        Self::new(key, false, 0.0)
    }

    /// Fire once for each app version.
    pub fn per_version(key: impl Into<String>) -> Self {
        Self::new(key, true, 0.0)
    }

    /// Fire once every `days` days.
    pub fn every_days(key: impl Into<String>, days: f64) -> Self {
        Self::new(key, false, days)
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Which branch a gated call took.
///
/// Reported even when the chosen branch had no action to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not yet satisfied: the primary action runs and the firing is recorded.
    Primary,
    /// Already satisfied: the secondary action runs, nothing is recorded.
    Secondary,
}

// ---------------------------------------------------------------------------
// ExecutionGate
// ---------------------------------------------------------------------------

pub struct ExecutionGate<B, C = SystemClock> {
    store: RecordStore<B>,
    table: RecordTable,
    version: String,
    clock: C,
}

impl<B: KeyValueBackend> ExecutionGate<B, SystemClock> {
    /// Load the stored records and build a gate stamping `version` onto
    /// every firing. Fails with [`OnceError::MissingVersion`] when `version`
    /// is empty.
    pub fn open(store: RecordStore<B>, version: impl Into<String>) -> Result<Self> {
        Self::with_clock(store, version, SystemClock)
    }
}

impl<B: KeyValueBackend, C: Clock> ExecutionGate<B, C> {
    pub fn with_clock(store: RecordStore<B>, version: impl Into<String>, clock: C) -> Result<Self> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(OnceError::MissingVersion);
        }
        let table = store.load()?;
        Ok(Self {
            store,
            table,
            version,
            clock,
        })
    }

    /// The decision `run_gated` would make for `policy` right now.
    pub fn evaluate(&self, policy: &GatePolicy) -> Decision {
        let Some(record) = self.table.get(&policy.key) else {
            return Decision::Primary;
        };

        let mut satisfied = true;
        if policy.per_version {
            satisfied &= record.last_executed_version == self.version;
        }
        if policy.every_x_days > 0.0 {
            let days = elapsed_days(self.clock.now(), record.last_executed_at);
            satisfied &= days < policy.every_x_days;
        }

        if satisfied {
            Decision::Secondary
        } else {
            Decision::Primary
        }
    }

    /// Run `primary` if the gate is not yet satisfied, otherwise `secondary`.
    ///
    /// Firing the primary action overwrites the key's record with the
    /// current time and version and persists the whole table before
    /// returning. No record is written when `primary` is `None`.
    ///
    /// If persisting fails the error is returned, but the in-memory table
    /// already holds the new record; the next successful save catches the
    /// store up.
    pub fn run_gated<P, S>(
        &mut self,
        policy: &GatePolicy,
        primary: Option<P>,
        secondary: Option<S>,
    ) -> Result<Decision>
    where
        P: FnOnce(),
        S: FnOnce(),
    {
        let decision = self.evaluate(policy);
        debug!(key = %policy.key, ?decision, "gate evaluated");

        match decision {
            Decision::Secondary => {
                if let Some(action) = secondary {
                    action();
                }
            }
            Decision::Primary => {
                if let Some(action) = primary {
                    action();
                    self.record_execution(&policy.key)?;
                }
            }
        }
        Ok(decision)
    }

    fn record_execution(&mut self, key: &str) -> Result<()> {
        let record = ExecutionRecord::new(self.clock.now(), self.version.clone());
        self.table.insert(key.to_string(), record);
        if let Err(e) = self.store.save(&self.table) {
            warn!(key = %key, error = %e, "failed to persist execution record");
            return Err(e);
        }
        Ok(())
    }

    /// Forget every recorded firing, in memory and in storage.
    pub fn reset(&mut self) -> Result<()> {
        let cleared = self.table.len();
        self.table.clear();
        self.store.clear()?;
        info!(records = cleared, "execution records reset");
        Ok(())
    }

    /// Replace the in-memory table with what storage currently holds.
    pub fn reload(&mut self) -> Result<()> {
        self.table = self.store.load()?;
        Ok(())
    }

    pub fn record(&self, key: &str) -> Option<&ExecutionRecord> {
        self.table.get(key)
    }

    pub fn records(&self) -> &RecordTable {
        &self.table
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn store(&self) -> &RecordStore<B> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Convenience wrappers
    // -----------------------------------------------------------------------

    pub fn execute_once<P: FnOnce()>(&mut self, key: &str, action: P) -> Result<Decision> {
        self.run_gated(&GatePolicy::once(key), Some(action), None::<fn()>)
    }

    /// `action` the first time, `other_times` on every later call.
    pub fn execute_once_or<P: FnOnce(), S: FnOnce()>(
        &mut self,
        key: &str,
        action: P,
        other_times: S,
    ) -> Result<Decision> {
        self.run_gated(&GatePolicy::once(key), Some(action), Some(other_times))
    }

    pub fn execute_once_per_version<P: FnOnce()>(
        &mut self,
        key: &str,
        action: P,
    ) -> Result<Decision> {
        self.run_gated(&GatePolicy::per_version(key), Some(action), None::<fn()>)
    }

    pub fn execute_once_per_version_or<P: FnOnce(), S: FnOnce()>(
        &mut self,
        key: &str,
        action: P,
        other_times: S,
    ) -> Result<Decision> {
        self.run_gated(
            &GatePolicy::per_version(key),
            Some(action),
            Some(other_times),
        )
    }

    pub fn execute_once_per_interval<P: FnOnce()>(
        &mut self,
        key: &str,
        days: f64,
        action: P,
    ) -> Result<Decision> {
        self.run_gated(&GatePolicy::every_days(key, days), Some(action), None::<fn()>)
    }

    pub fn execute_once_per_interval_or<P: FnOnce(), S: FnOnce()>(
        &mut self,
        key: &str,
        days: f64,
        action: P,
        other_times: S,
    ) -> Result<Decision> {
        self.run_gated(
            &GatePolicy::every_days(key, days),
            Some(action),
            Some(other_times),
        )
    }
}

/// Days between `then` and `now`, using [`SECONDS_PER_DAY`].
///
/// Negative when the clock has gone backwards, which keeps interval gates
/// closed.
fn elapsed_days(now: DateTime<Utc>, then: DateTime<Utc>) -> f64 {
    let elapsed = now.signed_duration_since(then);
    elapsed.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
