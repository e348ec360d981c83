//! Pipeline-wide constants
//!
//! Change-metric windows, snapshot matching tolerance, and the fixed names of
//! the local artifacts written by the persistence layer.

/// Look-back window for the 24h change metric, in seconds
pub const WINDOW_24H_SECS: i64 = 86_400;

/// Look-back window for the 7d change metric, in seconds
pub const WINDOW_7D_SECS: i64 = 7 * 86_400;

/// Look-back window for the 30d change metric, in seconds
pub const WINDOW_30D_SECS: i64 = 30 * 86_400;

/// Maximum distance between `now - window` and a historical snapshot for the
/// snapshot to count as that window's baseline
pub const SNAPSHOT_TOLERANCE_SECS: i64 = 2 * 3_600;

/// Label substituted for an empty protocol category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Full output artifact (summary + ranked list + chart + snapshot history)
pub const FULL_OUTPUT_FILE: &str = "oracle_tvs.json";

/// Summary output artifact (top-N subset, no full list or history)
pub const SUMMARY_OUTPUT_FILE: &str = "oracle_tvs_summary.json";

/// Watermark state for the primary pipeline
pub const STATE_FILE: &str = "state.json";

/// Output artifact of the secondary per-protocol TVL pipeline
pub const PROTOCOL_TVL_FILE: &str = "protocol_tvl.json";

/// Watermark state for the secondary per-protocol TVL pipeline
pub const PROTOCOL_TVL_STATE_FILE: &str = "protocol_tvl_state.json";

/// Cache key for the oracle feed payload
pub const FEED_CACHE_KEY: &str = "oracles";

/// Cache key for the protocols payload
pub const PROTOCOLS_CACHE_KEY: &str = "protocols";

/// Backoff delays are capped here regardless of attempt count
pub const MAX_BACKOFF_SECS: u64 = 60;
