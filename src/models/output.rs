use crate::models::{
    AggregationResult, CategoryBreakdown, ChainBreakdown, ChangeMetrics, RankedProtocol,
    SnapshotHistory,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One point of the oracle's chart series in the full output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: i64,
    pub tvs: f64,
}

/// Full output artifact: identity, summary, breakdowns, the complete ranked
/// protocol list, chart history, and the full snapshot history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullOutput {
    pub oracle: String,
    pub generated_at: String,
    pub timestamp: i64,
    pub date: String,
    pub total_tvs: f64,
    pub protocol_count: usize,
    pub change: ChangeMetrics,
    pub chain_breakdown: Vec<ChainBreakdown>,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub chains: Vec<String>,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_protocol: Option<RankedProtocol>,
    pub protocols: Vec<RankedProtocol>,
    pub chart: Vec<ChartPoint>,
    #[serde(default)]
    pub history: SnapshotHistory,
}

impl FullOutput {
    pub fn new(
        result: &AggregationResult,
        chart: &BTreeMap<i64, f64>,
        history: &SnapshotHistory,
        generated_at: String,
    ) -> Self {
        Self {
            oracle: result.oracle.clone(),
            generated_at,
            timestamp: result.timestamp,
            date: result.date.clone(),
            total_tvs: result.total_tvs,
            protocol_count: result.protocol_count,
            change: result.change.clone(),
            chain_breakdown: result.chain_breakdown.clone(),
            category_breakdown: result.category_breakdown.clone(),
            chains: result.chains.clone(),
            categories: result.categories.clone(),
            top_protocol: result.top_protocol.clone(),
            protocols: result.protocols.clone(),
            chart: chart
                .iter()
                .map(|(&timestamp, &tvs)| ChartPoint { timestamp, tvs })
                .collect(),
            history: history.clone(),
        }
    }
}

/// Summary artifact: the full output minus the complete protocol list and
/// history, plus a top-N protocol subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub oracle: String,
    pub generated_at: String,
    pub timestamp: i64,
    pub date: String,
    pub total_tvs: f64,
    pub protocol_count: usize,
    pub change: ChangeMetrics,
    pub chain_breakdown: Vec<ChainBreakdown>,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub chains: Vec<String>,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_protocol: Option<RankedProtocol>,
    pub top_protocols: Vec<RankedProtocol>,
}

impl SummaryOutput {
    pub fn new(result: &AggregationResult, top_n: usize, generated_at: String) -> Self {
        Self {
            oracle: result.oracle.clone(),
            generated_at,
            timestamp: result.timestamp,
            date: result.date.clone(),
            total_tvs: result.total_tvs,
            protocol_count: result.protocol_count,
            change: result.change.clone(),
            chain_breakdown: result.chain_breakdown.clone(),
            category_breakdown: result.category_breakdown.clone(),
            chains: result.chains.clone(),
            categories: result.categories.clone(),
            top_protocol: result.top_protocol.clone(),
            top_protocols: result.protocols.iter().take(top_n).cloned().collect(),
        }
    }
}

/// Entry of the secondary per-protocol TVL artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolTvlEntry {
    pub slug: String,
    pub name: String,
    pub tvl: f64,
    pub chain_tvls: BTreeMap<String, f64>,
}

/// Output artifact of the secondary per-protocol TVL pipeline, committed with
/// its own watermark independent of the primary pipeline's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolTvlOutput {
    pub oracle: String,
    pub generated_at: String,
    pub timestamp: i64,
    pub protocols: Vec<ProtocolTvlEntry>,
}
