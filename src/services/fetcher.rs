//! Resilient fetch client for the aggregation API
//!
//! Every request goes out through a [`Transport`] with a freshly randomized
//! browser identity. Failures are classified retryable or permanent;
//! retryable ones back off exponentially with jitter, and once retries are
//! exhausted the last-known-good cached payload is served if one exists.
//! Fresh successes refresh that cache best-effort.
//!
//! The two top-level resources are fetched concurrently by [`fetch_all`];
//! per-protocol detail fetches are strictly sequential behind a minimum
//! inter-request delay.
//!
//! [`fetch_all`]: LlamaFetcher::fetch_all

use crate::config::AppConfig;
use crate::constants::{FEED_CACHE_KEY, MAX_BACKOFF_SECS, PROTOCOLS_CACHE_KEY};
use crate::error::{AppError, Result};
use crate::models::{OracleFeed, ProtocolDetail, RawProtocol};
use crate::services::cache::PayloadCache;
use crate::services::headers::BrowserIdentity;
use crate::services::transport::Transport;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

struct Resource {
    label: String,
    url: String,
    cache_key: String,
}

/// Leaky rate limiter: a fixed minimum delay between consecutive calls.
/// The lock is held across the sleep, so callers are strictly sequential.
pub struct MinInterval {
    delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinInterval {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Exponential backoff with uniform jitter in [0.75, 1.25], capped.
/// `attempt` is the 1-based retry number.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    let exponential = base.saturating_mul(1u32 << shift);
    let capped = exponential.min(Duration::from_secs(MAX_BACKOFF_SECS));
    let jitter = rand::thread_rng().gen_range(0.75..=1.25);
    capped.mul_f64(jitter)
}

/// Waits until the shutdown flag flips to true. Pends forever when the
/// sender is gone, so a dropped sender never reads as a cancellation.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct LlamaFetcher {
    transport: Arc<dyn Transport>,
    cache: PayloadCache,
    api_base: String,
    dashboard_url: String,
    max_retries: u32,
    base_delay: Duration,
    detail_interval: MinInterval,
    shutdown: watch::Receiver<bool>,
}

impl LlamaFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: PayloadCache,
        config: &AppConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            cache,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            dashboard_url: config.dashboard_url.clone(),
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            detail_interval: MinInterval::new(config.detail_delay()),
            shutdown,
        }
    }

    /// Fetch the oracle feed and the protocols list concurrently.
    ///
    /// Any failure is surfaced and the other payload discarded; when both
    /// fail, the feed (first-declared resource) error wins so callers see a
    /// deterministic ordering.
    pub async fn fetch_all(&self) -> Result<(OracleFeed, Vec<RawProtocol>)> {
        let (feed, protocols) = tokio::join!(self.fetch_feed(), self.fetch_protocols());
        Ok((feed?, protocols?))
    }

    pub async fn fetch_feed(&self) -> Result<OracleFeed> {
        self.fetch_json(&Resource {
            label: "oracles".to_string(),
            url: format!("{}/oracles", self.api_base),
            cache_key: FEED_CACHE_KEY.to_string(),
        })
        .await
    }

    pub async fn fetch_protocols(&self) -> Result<Vec<RawProtocol>> {
        self.fetch_json(&Resource {
            label: "protocols".to_string(),
            url: format!("{}/protocols", self.api_base),
            cache_key: PROTOCOLS_CACHE_KEY.to_string(),
        })
        .await
    }

    /// TVL detail for one protocol, rate-limited and strictly sequential.
    /// A 404 means the protocol is unknown upstream: absent result, not an
    /// error.
    pub async fn fetch_protocol_detail(&self, slug: &str) -> Result<Option<ProtocolDetail>> {
        self.detail_interval.wait().await;
        let resource = Resource {
            label: format!("protocol/{}", slug),
            url: format!("{}/protocol/{}", self.api_base, slug),
            cache_key: PayloadCache::detail_key(slug),
        };
        match self.fetch_json(&resource).await {
            Ok(detail) => Ok(Some(detail)),
            Err(AppError::Status(404)) => {
                warn!(slug, "Protocol not found upstream");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, resource: &Resource) -> Result<T> {
        let mut shutdown = self.shutdown.clone();
        let mut last_error: Option<AppError> = None;

        for attempt in 0..=self.max_retries {
            if *shutdown.borrow() {
                return Err(AppError::Cancelled);
            }
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                let reason = last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                info!(
                    resource = %resource.label,
                    attempt,
                    max_retries = self.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "Retrying after backoff"
                );
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = cancelled(&mut shutdown) => return Err(AppError::Cancelled),
                }
            }

            let identity = BrowserIdentity::random();
            let headers = identity.request_headers(&self.dashboard_url);
            let outcome = tokio::select! {
                r = self.transport.get(&resource.url, &headers) => r,
                _ = cancelled(&mut shutdown) => return Err(AppError::Cancelled),
            };

            match outcome {
                Ok(response) if (200..300).contains(&response.status) => {
                    // decode errors are permanent and never fall back to cache
                    let decoded: T = serde_json::from_slice(&response.body)?;
                    if let Err(e) = self.cache.write(&resource.cache_key, &response.body) {
                        warn!(resource = %resource.label, error = %e, "Cache write failed");
                    }
                    return Ok(decoded);
                }
                Ok(response) => {
                    let error = AppError::Status(response.status);
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        if let Some(bytes) = self.cache.read(&resource.cache_key) {
            match serde_json::from_slice(&bytes) {
                Ok(decoded) => {
                    warn!(
                        resource = %resource.label,
                        "Retries exhausted; serving last-known-good cached payload"
                    );
                    return Ok(decoded);
                }
                Err(e) => {
                    warn!(resource = %resource.label, error = %e, "Cached payload unreadable");
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::Other(format!("{}: retries exhausted", resource.label))))
    }
}
