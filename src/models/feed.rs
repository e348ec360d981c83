use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Oracle feed payload from the aggregation API.
///
/// Chart keys are string-encoded Unix timestamps; the maximum parseable key
/// across every oracle's series is the feed's "latest" timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleFeed {
    /// oracle name -> timestamp string -> total secured value
    #[serde(default)]
    pub chart: HashMap<String, HashMap<String, f64>>,

    /// oracle name -> protocol name -> timestamp string -> chain -> value
    #[serde(default, rename = "tvsByChain")]
    pub tvs_by_chain:
        HashMap<String, HashMap<String, HashMap<String, HashMap<String, f64>>>>,

    /// oracle name -> chains the oracle is active on
    #[serde(default, rename = "chainsByOracle")]
    pub chains_by_oracle: HashMap<String, Vec<String>>,
}

impl OracleFeed {
    /// Maximum parseable integer key across the feed's chart series.
    /// Absent or unparseable data yields 0.
    pub fn latest_timestamp(&self) -> i64 {
        self.chart
            .values()
            .flat_map(|series| series.keys())
            .filter_map(|key| key.parse::<i64>().ok())
            .max()
            .unwrap_or(0)
    }

    /// Per-chain values for one protocol under one oracle at a timestamp.
    pub fn chain_values(
        &self,
        oracle: &str,
        protocol: &str,
        timestamp: i64,
    ) -> Option<&HashMap<String, f64>> {
        self.tvs_by_chain
            .get(oracle)?
            .get(protocol)?
            .get(&timestamp.to_string())
    }

    /// One oracle's chart series ordered by timestamp, unparseable keys
    /// skipped.
    pub fn chart_series(&self, oracle: &str) -> BTreeMap<i64, f64> {
        self.chart
            .get(oracle)
            .map(|series| {
                series
                    .iter()
                    .filter_map(|(key, value)| key.parse::<i64>().ok().map(|ts| (ts, *value)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_with_chart(entries: &[(&str, &[(&str, f64)])]) -> OracleFeed {
        let mut feed = OracleFeed::default();
        for (oracle, series) in entries {
            feed.chart.insert(
                oracle.to_string(),
                series.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            );
        }
        feed
    }

    #[test]
    fn latest_timestamp_takes_max_across_oracles() {
        let feed = feed_with_chart(&[
            ("Switchboard", &[("1700000000", 10.0), ("1700086400", 12.0)]),
            ("Pyth", &[("1700172800", 99.0)]),
        ]);
        assert_eq!(feed.latest_timestamp(), 1_700_172_800);
    }

    #[test]
    fn latest_timestamp_skips_unparseable_keys() {
        let feed = feed_with_chart(&[("Switchboard", &[("not-a-ts", 1.0), ("100", 2.0)])]);
        assert_eq!(feed.latest_timestamp(), 100);
    }

    #[test]
    fn latest_timestamp_empty_feed_is_zero() {
        assert_eq!(OracleFeed::default().latest_timestamp(), 0);
        let feed = feed_with_chart(&[("Switchboard", &[("garbage", 5.0)])]);
        assert_eq!(feed.latest_timestamp(), 0);
    }

    #[test]
    fn chart_series_sorted_by_timestamp() {
        let feed = feed_with_chart(&[(
            "Switchboard",
            &[("200", 2.0), ("100", 1.0), ("bad", 9.0)],
        )]);
        let series = feed.chart_series("Switchboard");
        assert_eq!(
            series.into_iter().collect::<Vec<_>>(),
            vec![(100, 1.0), (200, 2.0)]
        );
    }
}
