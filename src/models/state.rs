use crate::utils::iso_date;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Watermark state persisted at the end of each successful processing cycle.
///
/// Read once at pipeline start; a missing or corrupt state file is treated as
/// a first run, never a fatal error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentState {
    /// Latest feed timestamp processed so far; 0 means first run
    #[serde(default)]
    pub last_updated: i64,
    #[serde(default)]
    pub last_updated_date: String,
    #[serde(default)]
    pub protocol_count: usize,
    #[serde(default)]
    pub total_tvs: f64,
    /// Number of snapshots appended over the lifetime of the state file
    #[serde(default)]
    pub snapshot_count: usize,
}

impl PersistentState {
    pub fn is_first_run(&self) -> bool {
        self.last_updated == 0
    }

    /// Whether a feed carrying `current` as its latest timestamp warrants a
    /// processing cycle.
    ///
    /// First run and newer data process; equal timestamps skip; a timestamp
    /// regression skips with a warning (anomalous but non-fatal).
    pub fn should_process(&self, current: i64) -> bool {
        if self.is_first_run() {
            return true;
        }
        if current > self.last_updated {
            return true;
        }
        if current < self.last_updated {
            warn!(
                current_timestamp = current,
                last_updated = self.last_updated,
                "Feed timestamp regressed below watermark; skipping cycle"
            );
        } else {
            debug!(
                current_timestamp = current,
                "No new data since last cycle; skipping"
            );
        }
        false
    }

    /// State after a committed cycle.
    pub fn advanced(&self, timestamp: i64, protocol_count: usize, total_tvs: f64) -> Self {
        Self {
            last_updated: timestamp,
            last_updated_date: iso_date(timestamp),
            protocol_count,
            total_tvs,
            snapshot_count: self.snapshot_count + 1,
        }
    }
}
