//! Append-only usage ledger.
//!
//! One [`UsageRecord`] per completed or failed logical invocation — not
//! per retry attempt, so cost accounting stays truthful. Records are
//! never updated after creation: this is a ledger, not a cache. Failed
//! and gateway-rejected calls are recorded too (at zero cost), so spend
//! and health observability stay accurate during outages.
//!
//! Durability is optional: with a sink path configured, every record is
//! also appended as one JSON line. Sink write errors are logged and
//! swallowed — recording must never fail a call that already ran.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;

/// Immutable record of one logical invocation's outcome and cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Provider name.
    pub provider: String,
    /// Operation name.
    pub operation: String,
    /// Actual cost in US dollars (0 for failures and cache hits).
    pub cost_usd: f64,
    /// Whether the response was served from cache.
    pub cache_hit: bool,
    /// Wall time across the full retry sequence, in milliseconds.
    pub response_time_ms: u64,
    /// Outcome label ("ok", "timeout", "server_error", ...).
    pub status: String,
    /// When the invocation completed.
    pub timestamp: DateTime<Utc>,
    /// Request fingerprint, for correlating with log lines.
    pub correlation_id: String,
    /// Opaque business-unit-of-work tag supplied by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_tag: Option<String>,
}

impl UsageRecord {
    /// Response time as a `Duration`.
    pub fn response_time(&self) -> Duration {
        Duration::from_millis(self.response_time_ms)
    }
}

/// Append-only ledger of usage records.
pub struct UsageLedger {
    records: Mutex<Vec<UsageRecord>>,
    sink: Option<Mutex<File>>,
}

impl UsageLedger {
    /// Create an in-memory ledger with no on-disk sink.
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            sink: None,
        }
    }

    /// Create a ledger that also appends each record as a JSON line.
    ///
    /// The file is opened in append mode so records survive restarts.
    pub fn with_sink(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            records: Mutex::new(Vec::new()),
            sink: Some(Mutex::new(file)),
        })
    }

    /// Append a record. Always succeeds; sink errors are logged only.
    pub fn record(&self, record: UsageRecord) {
        if let Some(sink) = &self.sink {
            match serde_json::to_string(&record) {
                Ok(line) => {
                    let mut file = sink.lock().expect("ledger sink lock poisoned");
                    if let Err(e) = writeln!(file, "{line}") {
                        warn!(error = %e, "failed to append usage record to ledger sink");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize usage record"),
            }
        }
        self.records
            .lock()
            .expect("ledger lock poisoned")
            .push(record);
    }

    /// Snapshot of all records, oldest first.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().expect("ledger lock poisoned").clone()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.lock().expect("ledger lock poisoned").len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total recorded cost since `since`, optionally for one provider.
    ///
    /// Aggregates the raw ledger; the budget guardrail's materialized
    /// windows must always be reconcilable against this.
    pub fn total_cost_since(&self, since: DateTime<Utc>, provider: Option<&str>) -> f64 {
        self.records
            .lock()
            .expect("ledger lock poisoned")
            .iter()
            .filter(|r| r.timestamp >= since)
            .filter(|r| provider.is_none_or(|p| r.provider == p))
            .map(|r| r.cost_usd)
            .sum()
    }
}
