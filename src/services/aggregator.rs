//! Aggregation and metrics engine
//!
//! Pure computation: takes the fetched feed, the protocol list and the
//! snapshot history, returns a complete [`AggregationResult`]. No I/O, no
//! clock reads; `now` is an argument so the change windows are testable.

use crate::constants::{
    SNAPSHOT_TOLERANCE_SECS, UNCATEGORIZED, WINDOW_24H_SECS, WINDOW_30D_SECS, WINDOW_7D_SECS,
};
use crate::models::{
    AggregatedProtocol, AggregationResult, CategoryBreakdown, ChainBreakdown, ChangeMetrics,
    OracleFeed, RankedProtocol, RawProtocol, Snapshot, SnapshotHistory,
};
use crate::utils::iso_date;
use std::collections::BTreeMap;
use tracing::debug;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        round2(part / total * 100.0)
    }
}

/// Value desc, name asc on ties. Drives both ranking and top-protocol
/// selection so the two can never disagree.
fn by_value_then_name(a: &AggregatedProtocol, b: &AggregatedProtocol) -> std::cmp::Ordering {
    b.tvs
        .partial_cmp(&a.tvs)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.name.cmp(&b.name))
}

/// One full aggregation pass for `oracle` at the feed's latest timestamp.
/// Empty inputs produce a zero-valued result, never an error.
pub fn aggregate(
    oracle: &str,
    feed: &OracleFeed,
    protocols: &[RawProtocol],
    history: &SnapshotHistory,
    now: i64,
) -> AggregationResult {
    let timestamp = feed.latest_timestamp();

    let mut aggregated: Vec<AggregatedProtocol> = protocols
        .iter()
        .filter(|p| p.uses_oracle(oracle))
        .map(|p| resolve_protocol(oracle, feed, p, timestamp))
        .collect();
    aggregated.sort_by(by_value_then_name);

    let total_tvs: f64 = aggregated.iter().map(|p| p.tvs).sum();
    debug!(
        oracle,
        timestamp,
        protocols = aggregated.len(),
        total_tvs,
        "Aggregated feed"
    );

    let chain_breakdown = chain_breakdown(&aggregated, total_tvs);
    let category_breakdown = category_breakdown(&aggregated, total_tvs);

    let chains: Vec<String> = chain_breakdown.iter().map(|c| c.chain.clone()).collect();
    let mut chains_sorted = chains;
    chains_sorted.sort();
    let mut categories: Vec<String> = aggregated
        .iter()
        .map(|p| normalized_category(p.category.as_deref()))
        .collect();
    categories.sort();
    categories.dedup();

    let change = change_metrics(history, total_tvs, aggregated.len(), now);

    let ranked: Vec<RankedProtocol> = aggregated
        .into_iter()
        .enumerate()
        .map(|(i, protocol)| RankedProtocol {
            rank: i + 1,
            protocol,
        })
        .collect();
    let top_protocol = ranked.first().cloned();

    AggregationResult {
        oracle: oracle.to_string(),
        timestamp,
        date: iso_date(timestamp),
        total_tvs,
        protocol_count: ranked.len(),
        protocols: ranked,
        top_protocol,
        chain_breakdown,
        category_breakdown,
        change,
        chains: chains_sorted,
        categories,
    }
}

/// The snapshot an aggregation pass appends to history.
pub fn snapshot_of(result: &AggregationResult) -> Snapshot {
    let tvs_by_chain: BTreeMap<String, f64> = result
        .chain_breakdown
        .iter()
        .map(|c| (c.chain.clone(), c.tvs))
        .collect();
    Snapshot::new(
        result.timestamp,
        result.total_tvs,
        tvs_by_chain,
        result.protocol_count,
    )
}

fn resolve_protocol(
    oracle: &str,
    feed: &OracleFeed,
    raw: &RawProtocol,
    timestamp: i64,
) -> AggregatedProtocol {
    let chain_tvs: BTreeMap<String, f64> = feed
        .chain_values(oracle, &raw.name, timestamp)
        .map(|values| {
            values
                .iter()
                .filter(|(_, v)| **v != 0.0)
                .map(|(chain, v)| (chain.clone(), *v))
                .collect()
        })
        .unwrap_or_default();
    let tvs = chain_tvs.values().sum();

    AggregatedProtocol {
        id: raw.id.clone(),
        name: raw.name.clone(),
        slug: raw.slug(),
        category: raw.category.clone(),
        url: raw.url.clone(),
        chains: raw.chains.clone(),
        chain_tvs,
        tvs,
    }
}

fn chain_breakdown(protocols: &[AggregatedProtocol], total: f64) -> Vec<ChainBreakdown> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for protocol in protocols {
        for (chain, value) in &protocol.chain_tvs {
            let entry = sums.entry(chain).or_default();
            entry.0 += value;
            entry.1 += 1;
        }
    }
    let mut breakdown: Vec<ChainBreakdown> = sums
        .into_iter()
        .filter(|(_, (tvs, _))| *tvs != 0.0)
        .map(|(chain, (tvs, protocols))| ChainBreakdown {
            chain: chain.to_string(),
            tvs,
            percentage: percentage(tvs, total),
            protocols,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.tvs
            .partial_cmp(&a.tvs)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chain.cmp(&b.chain))
    });
    breakdown
}

fn normalized_category(category: Option<&str>) -> String {
    match category {
        None | Some("") => UNCATEGORIZED.to_string(),
        Some(c) => c.to_string(),
    }
}

fn category_breakdown(protocols: &[AggregatedProtocol], total: f64) -> Vec<CategoryBreakdown> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for protocol in protocols {
        let category = normalized_category(protocol.category.as_deref());
        let entry = sums.entry(category).or_default();
        entry.0 += protocol.tvs;
        entry.1 += 1;
    }
    let mut breakdown: Vec<CategoryBreakdown> = sums
        .into_iter()
        .filter(|(_, (tvs, _))| *tvs != 0.0)
        .map(|(category, (tvs, protocols))| CategoryBreakdown {
            category,
            tvs,
            percentage: percentage(tvs, total),
            protocols,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.tvs
            .partial_cmp(&a.tvs)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    breakdown
}

fn pct_change(current: f64, historical: f64) -> f64 {
    if historical == 0.0 {
        0.0
    } else {
        round2((current - historical) / historical * 100.0)
    }
}

fn change_metrics(
    history: &SnapshotHistory,
    current_tvs: f64,
    current_count: usize,
    now: i64,
) -> ChangeMetrics {
    let lookup = |window: i64| history.nearest_within(now - window, SNAPSHOT_TOLERANCE_SECS);
    let day = lookup(WINDOW_24H_SECS);
    let week = lookup(WINDOW_7D_SECS);
    let month = lookup(WINDOW_30D_SECS);

    ChangeMetrics {
        change_24h: day.map(|s| pct_change(current_tvs, s.tvs)),
        change_7d: week.map(|s| pct_change(current_tvs, s.tvs)),
        change_30d: month.map(|s| pct_change(current_tvs, s.tvs)),
        protocol_count_change_7d: week.map(|s| current_count as i64 - s.protocol_count as i64),
        protocol_count_change_30d: month.map(|s| current_count as i64 - s.protocol_count as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn protocol(id: &str, name: &str, category: Option<&str>) -> RawProtocol {
        RawProtocol {
            id: id.to_string(),
            name: name.to_string(),
            slug: None,
            category: category.map(str::to_string),
            tvl: None,
            chains: Vec::new(),
            oracles: vec!["Switchboard".to_string()],
            oracle: None,
            url: None,
        }
    }

    fn feed(
        latest: &str,
        by_protocol: &[(&str, &[(&str, f64)])],
    ) -> OracleFeed {
        let mut feed = OracleFeed::default();
        let total: f64 = by_protocol
            .iter()
            .flat_map(|(_, chains)| chains.iter().map(|(_, v)| v))
            .sum();
        feed.chart.insert(
            "Switchboard".to_string(),
            HashMap::from([(latest.to_string(), total)]),
        );
        let mut protocols = HashMap::new();
        for (name, chains) in by_protocol {
            let values: HashMap<String, f64> =
                chains.iter().map(|(c, v)| (c.to_string(), *v)).collect();
            protocols.insert(
                name.to_string(),
                HashMap::from([(latest.to_string(), values)]),
            );
        }
        feed.tvs_by_chain.insert("Switchboard".to_string(), protocols);
        feed
    }

    #[test]
    fn filters_and_sums_per_chain_contributions() {
        let protocols = vec![
            protocol("1", "proto-a", Some("Lending")),
            protocol("2", "proto-b", Some("Derivatives")),
            RawProtocol {
                oracles: vec!["Pyth".to_string()],
                ..protocol("3", "other-oracle", None)
            },
        ];
        let feed = feed(
            "1700000000",
            &[
                ("proto-a", &[("Solana", 1000.0), ("Sui", 500.0)]),
                ("proto-b", &[("Aptos", 250.0)]),
            ],
        );
        let result = aggregate("Switchboard", &feed, &protocols, &SnapshotHistory::new(), 0);

        assert_eq!(result.timestamp, 1_700_000_000);
        assert_eq!(result.protocol_count, 2);
        assert_eq!(result.total_tvs, 1750.0);
        assert_eq!(result.protocols[0].protocol.name, "proto-a");
        assert_eq!(result.protocols[0].rank, 1);
        assert_eq!(result.protocols[0].protocol.tvs, 1500.0);
        assert_eq!(result.protocols[1].protocol.name, "proto-b");
        assert_eq!(result.protocols[1].rank, 2);
        assert_eq!(result.chains, vec!["Aptos", "Solana", "Sui"]);
        assert_eq!(result.top_protocol.as_ref().unwrap().protocol.name, "proto-a");
    }

    #[test]
    fn totals_match_chain_map_and_percentages_sum() {
        let protocols = vec![
            protocol("1", "a", Some("Lending")),
            protocol("2", "b", Some("Lending")),
            protocol("3", "c", Some("")),
        ];
        let feed = feed(
            "100",
            &[
                ("a", &[("Solana", 600.0)]),
                ("b", &[("Solana", 300.0), ("Base", 50.0)]),
                ("c", &[("Base", 50.0)]),
            ],
        );
        let result = aggregate("Switchboard", &feed, &protocols, &SnapshotHistory::new(), 0);

        for ranked in &result.protocols {
            let sum: f64 = ranked.protocol.chain_tvs.values().sum();
            assert_eq!(ranked.protocol.tvs, sum);
        }
        let pct_sum: f64 = result.chain_breakdown.iter().map(|c| c.percentage).sum();
        assert!((pct_sum - 100.0).abs() < 0.1);
        let cat_pct: f64 = result.category_breakdown.iter().map(|c| c.percentage).sum();
        assert!((cat_pct - 100.0).abs() < 0.1);
        assert!(result
            .category_breakdown
            .iter()
            .any(|c| c.category == UNCATEGORIZED));
        assert_eq!(result.categories, vec!["Lending", UNCATEGORIZED]);
    }

    #[test]
    fn ties_rank_by_name_ascending() {
        let protocols = vec![
            protocol("1", "zeta", None),
            protocol("2", "alpha", None),
            protocol("3", "mid", None),
        ];
        let feed = feed(
            "100",
            &[
                ("zeta", &[("Solana", 500.0)]),
                ("alpha", &[("Solana", 500.0)]),
                ("mid", &[("Solana", 500.0)]),
            ],
        );
        let result = aggregate("Switchboard", &feed, &protocols, &SnapshotHistory::new(), 0);

        let names: Vec<&str> = result
            .protocols
            .iter()
            .map(|r| r.protocol.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        let ranks: Vec<usize> = result.protocols.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn zero_contribution_chains_and_entries_are_omitted() {
        let protocols = vec![protocol("1", "a", None)];
        let feed = feed("100", &[("a", &[("Solana", 100.0), ("Base", 0.0)])]);
        let result = aggregate("Switchboard", &feed, &protocols, &SnapshotHistory::new(), 0);

        assert!(!result.protocols[0].protocol.chain_tvs.contains_key("Base"));
        assert!(result.chain_breakdown.iter().all(|c| c.chain != "Base"));
    }

    #[test]
    fn empty_inputs_yield_zero_valued_result() {
        let result = aggregate(
            "Switchboard",
            &OracleFeed::default(),
            &[],
            &SnapshotHistory::new(),
            0,
        );
        assert_eq!(result.timestamp, 0);
        assert_eq!(result.total_tvs, 0.0);
        assert_eq!(result.protocol_count, 0);
        assert!(result.top_protocol.is_none());
        assert!(result.chain_breakdown.is_empty());
        assert!(result.chains.is_empty());
        assert!(result.change.is_empty());
    }

    #[test]
    fn zero_grand_total_produces_no_breakdown_entries() {
        let protocols = vec![protocol("1", "a", Some("Lending"))];
        let feed = feed("100", &[("a", &[("Solana", 0.0)])]);
        let result = aggregate("Switchboard", &feed, &protocols, &SnapshotHistory::new(), 0);

        assert_eq!(result.total_tvs, 0.0);
        assert!(result.chain_breakdown.is_empty());
        assert!(result.category_breakdown.is_empty());
    }

    #[test]
    fn change_metrics_use_nearest_snapshot_within_tolerance() {
        let now = 10 * WINDOW_24H_SECS;
        let mut history = SnapshotHistory::new();
        // 30 minutes off the exact 24h mark, inside tolerance
        history.append(Snapshot::new(
            now - WINDOW_24H_SECS + 1800,
            1000.0,
            BTreeMap::new(),
            5,
        ));
        history.append(Snapshot::new(
            now - WINDOW_7D_SECS,
            2000.0,
            BTreeMap::new(),
            8,
        ));

        let protocols = vec![protocol("1", "a", None)];
        let feed = feed("100", &[("a", &[("Solana", 1100.0)])]);
        let result = aggregate("Switchboard", &feed, &protocols, &history, now);

        assert_eq!(result.change.change_24h, Some(10.0));
        assert_eq!(result.change.change_7d, Some(-45.0));
        assert_eq!(result.change.change_30d, None);
        assert_eq!(result.change.protocol_count_change_7d, Some(1 - 8));
        assert_eq!(result.change.protocol_count_change_30d, None);
    }

    #[test]
    fn change_against_zero_baseline_is_zero() {
        let now = 10 * WINDOW_24H_SECS;
        let mut history = SnapshotHistory::new();
        history.append(Snapshot::new(now - WINDOW_24H_SECS, 0.0, BTreeMap::new(), 0));

        let protocols = vec![protocol("1", "a", None)];
        let feed = feed("100", &[("a", &[("Solana", 500.0)])]);
        let result = aggregate("Switchboard", &feed, &protocols, &history, now);

        assert_eq!(result.change.change_24h, Some(0.0));
    }

    #[test]
    fn empty_history_leaves_change_metrics_unset() {
        let protocols = vec![protocol("1", "a", None)];
        let feed = feed("100", &[("a", &[("Solana", 500.0)])]);
        let result = aggregate(
            "Switchboard",
            &feed,
            &protocols,
            &SnapshotHistory::new(),
            1_000_000,
        );
        assert!(result.change.is_empty());
    }

    #[test]
    fn legacy_singular_oracle_field_counts_as_membership() {
        let legacy = RawProtocol {
            oracles: Vec::new(),
            oracle: Some("Switchboard".to_string()),
            ..protocol("1", "legacy", None)
        };
        let feed = feed("100", &[("legacy", &[("Solana", 10.0)])]);
        let result = aggregate("Switchboard", &feed, &[legacy], &SnapshotHistory::new(), 0);
        assert_eq!(result.protocol_count, 1);
    }

    #[test]
    fn snapshot_of_carries_chain_sums() {
        let protocols = vec![protocol("1", "a", None), protocol("2", "b", None)];
        let feed = feed(
            "1700000000",
            &[
                ("a", &[("Solana", 100.0), ("Base", 20.0)]),
                ("b", &[("Solana", 50.0)]),
            ],
        );
        let result = aggregate("Switchboard", &feed, &protocols, &SnapshotHistory::new(), 0);
        let snap = snapshot_of(&result);

        assert_eq!(snap.timestamp, 1_700_000_000);
        assert_eq!(snap.tvs, 170.0);
        assert_eq!(snap.tvs_by_chain["Solana"], 150.0);
        assert_eq!(snap.tvs_by_chain["Base"], 20.0);
        assert_eq!(snap.protocol_count, 2);
        assert_eq!(snap.chain_count, 2);
    }
}
