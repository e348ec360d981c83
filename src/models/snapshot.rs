use crate::utils::iso_date;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time aggregate record used for historical change comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: i64,
    pub date: String,
    pub tvs: f64,
    pub tvs_by_chain: BTreeMap<String, f64>,
    pub protocol_count: usize,
    pub chain_count: usize,
}

impl Snapshot {
    pub fn new(
        timestamp: i64,
        tvs: f64,
        tvs_by_chain: BTreeMap<String, f64>,
        protocol_count: usize,
    ) -> Self {
        let chain_count = tvs_by_chain.len();
        Self {
            timestamp,
            date: iso_date(timestamp),
            tvs,
            tvs_by_chain,
            protocol_count,
            chain_count,
        }
    }
}

/// Snapshot sequence, strictly ascending by timestamp with unique timestamps.
///
/// No retention limit is applied; the sequence grows for the lifetime of the
/// deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotHistory {
    snapshots: Vec<Snapshot>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Insert keeping the sequence strictly ascending. A snapshot whose
    /// timestamp already exists replaces the existing entry in place.
    pub fn append(&mut self, snapshot: Snapshot) {
        match self
            .snapshots
            .binary_search_by_key(&snapshot.timestamp, |s| s.timestamp)
        {
            Ok(idx) => self.snapshots[idx] = snapshot,
            Err(idx) => self.snapshots.insert(idx, snapshot),
        }
    }

    /// The snapshot whose timestamp is closest to `target`, accepted only
    /// when within `tolerance` seconds.
    pub fn nearest_within(&self, target: i64, tolerance: i64) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .min_by_key(|s| (s.timestamp - target).abs())
            .filter(|s| (s.timestamp - target).abs() <= tolerance)
    }
}
