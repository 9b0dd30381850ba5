//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tickflow_agg::AggregatorConfig;
use tickflow_feed::{FeedConfig, PollEndpoint};
use tickflow_hub::ServerConfig;

/// Feed configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Live push-transport WebSocket URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Push-transport connect timeout (seconds).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Poll interval in fallback mode (seconds).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Raw tick buffer capacity.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Ordered polling endpoint list.
    #[serde(default = "default_poll_endpoints")]
    pub poll_endpoints: Vec<PollEndpoint>,
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443/ws/btcusdt@trade".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_buffer_capacity() -> usize {
    1000
}

fn default_poll_endpoints() -> Vec<PollEndpoint> {
    vec![
        PollEndpoint {
            name: "CoinGecko".to_string(),
            url: "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd&include_24hr_vol=true&include_24hr_change=true".to_string(),
            price_pointer: "/bitcoin/usd".to_string(),
            volume_pointer: Some("/bitcoin/usd_24h_vol".to_string()),
        },
        PollEndpoint {
            name: "CryptoCompare".to_string(),
            url: "https://min-api.cryptocompare.com/data/price?fsym=BTC&tsyms=USD".to_string(),
            price_pointer: "/USD".to_string(),
            volume_pointer: None,
        },
    ]
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            buffer_capacity: default_buffer_capacity(),
            poll_endpoints: default_poll_endpoints(),
        }
    }
}

/// Store configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Base directory for summary JSON Lines files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// In-memory tail size for `most_recent` queries.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_data_dir() -> String {
    "./data/summaries".to_string()
}

fn default_cache_size() -> usize {
    256
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_size: default_cache_size(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Instrument symbol attached to polled ticks.
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Feed configuration.
    #[serde(default)]
    pub feed: FeedSettings,
    /// Aggregation configuration.
    #[serde(default)]
    pub aggregation: AggregatorConfig,
    /// Store configuration.
    #[serde(default)]
    pub store: StoreSettings,
    /// Subscriber server configuration.
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_symbol() -> String {
    "BTCUSD".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            feed: FeedSettings::default(),
            aggregation: AggregatorConfig::default(),
            store: StoreSettings::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration: `TICKFLOW_CONFIG` env var or the default path,
    /// falling back to defaults when the file does not exist.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("TICKFLOW_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Build the feed configuration consumed by the feed manager.
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            ws_url: self.feed.ws_url.clone(),
            symbol: self.symbol.clone(),
            connect_timeout: Duration::from_secs(self.feed.connect_timeout_secs),
            poll_interval: Duration::from_secs(self.feed.poll_interval_secs),
            poll_endpoints: self.feed.poll_endpoints.clone(),
        }
    }
}
