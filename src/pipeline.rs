//! Processing pipeline: one complete fetch → aggregate → persist cycle
//!
//! The primary cycle tracks the oracle feed's latest timestamp as a
//! watermark and skips cycles that would reprocess already-seen data. After
//! a committed primary cycle a secondary pipeline fetches per-protocol TVL
//! details sequentially and commits its own artifact under its own
//! watermark.

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::models::{
    AggregationResult, FullOutput, ProtocolTvlEntry, ProtocolTvlOutput, SummaryOutput,
};
use crate::services::{
    aggregate, load_custom_protocols, merge_protocols, snapshot_of, ImpersonatedTransport,
    LlamaFetcher, OutputStore, PayloadCache, PlainTransport, Transport,
};
use crate::utils::{now_ts, rfc3339_now};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// New data was processed and artifacts committed
    Completed,
    /// Feed carried nothing newer than the watermark
    Skipped,
}

pub struct Pipeline {
    config: AppConfig,
    fetcher: LlamaFetcher,
    store: OutputStore,
}

impl Pipeline {
    pub fn new(config: AppConfig, dry_run: bool, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let transport: Arc<dyn Transport> = if config.plain_transport {
            Arc::new(PlainTransport::new(config.request_timeout())?)
        } else {
            Arc::new(ImpersonatedTransport::new(config.request_timeout())?)
        };
        Ok(Self::with_transport(config, dry_run, transport, shutdown))
    }

    pub fn with_transport(
        config: AppConfig,
        dry_run: bool,
        transport: Arc<dyn Transport>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let cache = PayloadCache::new(config.cache_dir.clone());
        let fetcher = LlamaFetcher::new(transport, cache, &config, shutdown);
        let store = OutputStore::new(config.output_dir.clone(), dry_run);
        Self {
            config,
            fetcher,
            store,
        }
    }

    /// One complete processing cycle. Cancellation aborts in-flight fetches
    /// and surfaces before any write happens.
    pub async fn run_once(&self) -> Result<RunOutcome> {
        let state = self.store.load_state();
        info!(
            oracle = %self.config.oracle,
            first_run = state.is_first_run(),
            last_updated = state.last_updated,
            "Starting cycle"
        );

        let (feed, mut protocols) = self.fetcher.fetch_all().await?;
        if self.config.custom_protocols_enabled {
            if let Some(path) = &self.config.custom_protocols_path {
                let custom = load_custom_protocols(path)?;
                protocols = merge_protocols(protocols, custom)?;
            }
        }

        let latest = feed.latest_timestamp();
        if !state.should_process(latest) {
            return Ok(RunOutcome::Skipped);
        }

        let mut history = self.store.load_history();
        let result = aggregate(
            &self.config.oracle,
            &feed,
            &protocols,
            &history,
            now_ts(),
        );
        history.append(snapshot_of(&result));

        let chart = feed.chart_series(&self.config.oracle);
        let full = FullOutput::new(&result, &chart, &history, rfc3339_now());
        let summary = SummaryOutput::new(&result, self.config.top_n, rfc3339_now());
        let next_state = state.advanced(result.timestamp, result.protocol_count, result.total_tvs);
        self.store.commit(&full, &summary, &next_state)?;

        info!(
            oracle = %self.config.oracle,
            timestamp = result.timestamp,
            total_tvs = result.total_tvs,
            protocols = result.protocol_count,
            snapshots = history.len(),
            "Cycle committed"
        );

        match self.run_protocol_tvl(&result).await {
            Ok(()) => {}
            // shutdown is not a failure; surface it so the caller stops
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                // the primary artifacts are already durable; the detail
                // artifact catches up on the next cycle
                warn!(error = %e, "Protocol TVL pipeline failed");
            }
        }

        Ok(RunOutcome::Completed)
    }

    async fn run_protocol_tvl(&self, result: &AggregationResult) -> Result<()> {
        let state = self.store.load_protocol_tvl_state();
        if !state.should_process(result.timestamp) {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(result.protocols.len());
        for ranked in &result.protocols {
            let slug = &ranked.protocol.slug;
            match self.fetcher.fetch_protocol_detail(slug).await? {
                Some(detail) => {
                    let chain_tvls = detail
                        .current_chain_tvls
                        .iter()
                        .map(|(chain, tvl)| (chain.clone(), *tvl))
                        .collect();
                    entries.push(ProtocolTvlEntry {
                        slug: slug.clone(),
                        name: detail
                            .name
                            .clone()
                            .unwrap_or_else(|| ranked.protocol.name.clone()),
                        tvl: detail.current_tvl(),
                        chain_tvls,
                    });
                }
                None => continue,
            }
        }

        let total: f64 = entries.iter().map(|e| e.tvl).sum();
        let output = ProtocolTvlOutput {
            oracle: result.oracle.clone(),
            generated_at: rfc3339_now(),
            timestamp: result.timestamp,
            protocols: entries,
        };
        let next = state.advanced(result.timestamp, output.protocols.len(), total);
        self.store.commit_protocol_tvl(&output, &next)?;
        info!(
            protocols = output.protocols.len(),
            timestamp = result.timestamp,
            "Protocol TVL artifact committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FULL_OUTPUT_FILE, PROTOCOL_TVL_FILE, STATE_FILE, SUMMARY_OUTPUT_FILE};
    use crate::error::AppError;
    use crate::models::PersistentState;
    use crate::services::TransportResponse;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::tempdir;

    struct FakeApi;

    #[async_trait]
    impl Transport for FakeApi {
        async fn get(
            &self,
            url: &str,
            _headers: &[(String, String)],
        ) -> Result<TransportResponse> {
            let body: &[u8] = if url.ends_with("/oracles") {
                br#"{
                    "chart": {"Switchboard": {"1700000000": 1500.0}},
                    "tvsByChain": {"Switchboard": {"Kamino": {"1700000000": {"Solana": 1000.0, "Sui": 500.0}}}},
                    "chainsByOracle": {"Switchboard": ["Solana", "Sui"]}
                }"#
            } else if url.ends_with("/protocols") {
                br#"[
                    {"id": "1", "name": "Kamino", "category": "Lending", "oracles": ["Switchboard"]},
                    {"id": "2", "name": "Aave", "category": "Lending", "oracles": ["Chainlink"]}
                ]"#
            } else if url.ends_with("/protocol/kamino") {
                br#"{
                    "name": "Kamino",
                    "tvl": [{"date": 1700000000, "totalLiquidityUSD": 1234.5}],
                    "currentChainTvls": {"Solana": 1234.5}
                }"#
            } else {
                return Err(AppError::Status(404));
            };
            Ok(TransportResponse {
                status: 200,
                body: body.to_vec(),
            })
        }
    }

    fn test_pipeline(dir: &tempfile::TempDir, dry_run: bool) -> (Pipeline, watch::Sender<bool>) {
        let config = AppConfig {
            output_dir: dir.path().join("data"),
            cache_dir: dir.path().join("cache"),
            detail_delay_ms: 0,
            base_delay_ms: 0,
            ..Default::default()
        };
        let (tx, rx) = watch::channel(false);
        (
            Pipeline::with_transport(config, dry_run, Arc::new(FakeApi), rx),
            tx,
        )
    }

    #[tokio::test]
    async fn full_cycle_commits_all_artifacts() {
        let dir = tempdir().unwrap();
        let (pipeline, _tx) = test_pipeline(&dir, false);

        let outcome = pipeline.run_once().await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let data = dir.path().join("data");
        let full: FullOutput =
            serde_json::from_slice(&fs::read(data.join(FULL_OUTPUT_FILE)).unwrap()).unwrap();
        assert_eq!(full.oracle, "Switchboard");
        assert_eq!(full.timestamp, 1_700_000_000);
        assert_eq!(full.total_tvs, 1500.0);
        assert_eq!(full.protocol_count, 1);
        assert_eq!(full.protocols[0].protocol.name, "Kamino");
        assert_eq!(full.history.len(), 1);

        let summary: SummaryOutput =
            serde_json::from_slice(&fs::read(data.join(SUMMARY_OUTPUT_FILE)).unwrap()).unwrap();
        assert_eq!(summary.top_protocols.len(), 1);

        let state: PersistentState =
            serde_json::from_slice(&fs::read(data.join(STATE_FILE)).unwrap()).unwrap();
        assert_eq!(state.last_updated, 1_700_000_000);
        assert_eq!(state.snapshot_count, 1);

        let tvl: ProtocolTvlOutput =
            serde_json::from_slice(&fs::read(data.join(PROTOCOL_TVL_FILE)).unwrap()).unwrap();
        assert_eq!(tvl.protocols.len(), 1);
        assert_eq!(tvl.protocols[0].tvl, 1234.5);
    }

    #[tokio::test]
    async fn unchanged_feed_skips_second_cycle() {
        let dir = tempdir().unwrap();
        let (pipeline, _tx) = test_pipeline(&dir, false);

        assert_eq!(pipeline.run_once().await.unwrap(), RunOutcome::Completed);
        assert_eq!(pipeline.run_once().await.unwrap(), RunOutcome::Skipped);
    }

    #[tokio::test]
    async fn dry_run_computes_without_writing() {
        let dir = tempdir().unwrap();
        let (pipeline, _tx) = test_pipeline(&dir, true);

        let outcome = pipeline.run_once().await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert!(!dir.path().join("data").exists());
    }

    /// Serves the same payloads as [`FakeApi`] but flips the shutdown flag
    /// while serving the protocols list, after the primary fetches have
    /// passed their cancellation checks.
    struct ShutdownMidRun {
        tx: watch::Sender<bool>,
    }

    #[async_trait]
    impl Transport for ShutdownMidRun {
        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<TransportResponse> {
            if url.ends_with("/protocols") {
                let _ = self.tx.send(true);
            }
            FakeApi.get(url, headers).await
        }
    }

    #[tokio::test]
    async fn shutdown_after_commit_surfaces_cancellation() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            output_dir: dir.path().join("data"),
            cache_dir: dir.path().join("cache"),
            detail_delay_ms: 0,
            base_delay_ms: 0,
            ..Default::default()
        };
        let (tx, rx) = watch::channel(false);
        let pipeline =
            Pipeline::with_transport(config, false, Arc::new(ShutdownMidRun { tx }), rx);

        let err = pipeline.run_once().await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));

        // the primary cycle committed before the shutdown took effect; the
        // detail artifact never got written
        let data = dir.path().join("data");
        assert!(data.join(FULL_OUTPUT_FILE).exists());
        assert!(data.join(STATE_FILE).exists());
        assert!(!data.join(PROTOCOL_TVL_FILE).exists());
    }

    #[tokio::test]
    async fn dry_run_repeats_because_state_never_advances() {
        let dir = tempdir().unwrap();
        let (pipeline, _tx) = test_pipeline(&dir, true);

        assert_eq!(pipeline.run_once().await.unwrap(), RunOutcome::Completed);
        assert_eq!(pipeline.run_once().await.unwrap(), RunOutcome::Completed);
    }
}
