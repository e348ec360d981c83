use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A protocol after filtering and chain-value resolution.
///
/// Invariant: `tvs == chain_tvs.values().sum()`. Chains with no contribution
/// are omitted from the map rather than carried as zero entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedProtocol {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub chains: Vec<String>,
    /// Per-chain contribution at the latest feed timestamp
    pub chain_tvs: BTreeMap<String, f64>,
    /// Sum of the per-chain contributions
    pub tvs: f64,
}

/// AggregatedProtocol plus its 1-based rank after sorting by value
/// descending, name ascending on ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedProtocol {
    pub rank: usize,
    #[serde(flatten)]
    pub protocol: AggregatedProtocol,
}

/// Value grouped by chain, with its share of the grand total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainBreakdown {
    pub chain: String,
    pub tvs: f64,
    pub percentage: f64,
    pub protocols: usize,
}

/// Value grouped by category, with its share of the grand total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub tvs: f64,
    pub percentage: f64,
    pub protocols: usize,
}

/// Point-in-time changes against history. A `None` field means no historical
/// snapshot existed within tolerance of that window, not a zero change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_7d: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_30d: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_count_change_7d: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_count_change_30d: Option<i64>,
}

impl ChangeMetrics {
    pub fn is_empty(&self) -> bool {
        self.change_24h.is_none()
            && self.change_7d.is_none()
            && self.change_30d.is_none()
            && self.protocol_count_change_7d.is_none()
            && self.protocol_count_change_30d.is_none()
    }
}

/// Complete output of one aggregation pass. Empty inputs produce a
/// zero-valued result, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    pub oracle: String,
    /// Latest feed timestamp; 0 when the feed had no parseable chart keys
    pub timestamp: i64,
    pub date: String,
    pub total_tvs: f64,
    pub protocol_count: usize,
    pub protocols: Vec<RankedProtocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_protocol: Option<RankedProtocol>,
    pub chain_breakdown: Vec<ChainBreakdown>,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub change: ChangeMetrics,
    /// Distinct chains with a non-zero contribution, sorted
    pub chains: Vec<String>,
    /// Distinct categories of the aggregated set, sorted
    pub categories: Vec<String>,
}
