use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Protocol record as returned by the aggregation API's protocols endpoint.
///
/// Oracle membership comes either through the `oracles` list or, for older
/// records, through the singular `oracle` field; both are checked when
/// filtering for the target oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProtocol {
    #[serde(default)]
    pub id: String,

    pub name: String,

    /// URL-safe identifier; derived from the name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Total locked value across all chains, as reported upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvl: Option<f64>,

    #[serde(default)]
    pub chains: Vec<String>,

    #[serde(default)]
    pub oracles: Vec<String>,

    /// Legacy singular oracle field, still present on older records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RawProtocol {
    /// Case-sensitive oracle membership check across both the list and the
    /// legacy singular field.
    pub fn uses_oracle(&self, oracle: &str) -> bool {
        self.oracles.iter().any(|o| o == oracle)
            || self.oracle.as_deref() == Some(oracle)
    }

    /// The provided slug, or one derived from the display name: lowercase,
    /// whitespace collapsed to single hyphens, everything else non-alphanumeric
    /// dropped.
    pub fn slug(&self) -> String {
        if let Some(slug) = &self.slug {
            if !slug.is_empty() {
                return slug.clone();
            }
        }
        derive_slug(&self.name)
    }
}

fn derive_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if c.is_whitespace() || c == '-' {
            if !last_hyphen && !slug.is_empty() {
                slug.push('-');
                last_hyphen = true;
            }
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// One point of a protocol's TVL time series from the detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvlPoint {
    pub date: i64,
    #[serde(rename = "totalLiquidityUSD")]
    pub total_liquidity_usd: f64,
}

/// Response of the per-protocol detail endpoint: a TVL time series plus the
/// current value-by-chain map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub tvl: Vec<TvlPoint>,

    #[serde(default, rename = "currentChainTvls")]
    pub current_chain_tvls: HashMap<String, f64>,
}

impl ProtocolDetail {
    /// Latest total TVL: the last series point, or the sum of the current
    /// chain map when the series is empty.
    pub fn current_tvl(&self) -> f64 {
        self.tvl
            .last()
            .map(|p| p.total_liquidity_usd)
            .unwrap_or_else(|| self.current_chain_tvls.values().sum())
    }
}
