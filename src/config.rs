//! Runtime configuration
//!
//! Defaults, an optional YAML file, then a small set of named environment
//! overrides, applied in that order. Malformed duration overrides are logged
//! and ignored rather than failing startup.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

fn default_oracle() -> String {
    "Switchboard".to_string()
}

fn default_api_base() -> String {
    "https://api.llama.fi".to_string()
}

fn default_dashboard_url() -> String {
    "https://defillama.com".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_detail_delay_ms() -> u64 {
    1_200
}

fn default_poll_interval_secs() -> u64 {
    3_600
}

fn default_top_n() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Oracle whose protocol coverage is being measured
    #[serde(default = "default_oracle")]
    pub oracle: String,

    /// Base URL of the aggregation API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Public dashboard site simulated as the request origin
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,

    /// Directory for output artifacts and watermark state
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory for last-known-good payload caches
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt; total attempts = max_retries + 1
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Minimum spacing between per-protocol detail requests
    #[serde(default = "default_detail_delay_ms")]
    pub detail_delay_ms: u64,

    /// Scheduling tick for daemon mode
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Number of protocols kept in the summary artifact
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Use the plain transport instead of the impersonating one, for
    /// trusted/internal endpoints or test traffic
    #[serde(default)]
    pub plain_transport: bool,

    /// Optional file of manually registered protocols
    #[serde(default)]
    pub custom_protocols_path: Option<PathBuf>,

    #[serde(default)]
    pub custom_protocols_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        // serde defaults are the single source of truth
        serde_yaml::from_str("{}").expect("empty config must deserialize")
    }
}

impl AppConfig {
    /// Load configuration from an optional YAML file, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", p.display(), e))
                })?;
                serde_yaml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Invalid config {}: {}", p.display(), e)))?
            }
            None => AppConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Named environment variables that override config fields. Malformed
    /// duration values are logged and ignored, never fatal.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ORACLE_NAME") {
            self.oracle = v;
        }
        if let Ok(v) = std::env::var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("LOG_FORMAT") {
            self.log_format = v;
        }
        if let Ok(v) = std::env::var("CUSTOM_PROTOCOLS_PATH") {
            self.custom_protocols_path = Some(PathBuf::from(v));
            self.custom_protocols_enabled = true;
        }
        if let Ok(v) = std::env::var("CUSTOM_PROTOCOLS_ENABLED") {
            self.custom_protocols_enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = parse_secs_var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = parse_secs_var("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = v;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn detail_delay(&self) -> Duration {
        Duration::from_millis(self.detail_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_secs_var(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(var = name, value = %raw, error = %e, "Ignoring malformed duration override");
            None
        }
    }
}
