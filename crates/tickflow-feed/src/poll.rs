//! Polling fallback client.
//!
//! Issues one GET per poll tick against a rotating list of REST endpoints.
//! Each endpoint carries a JSON-pointer parse rule extracting one price and
//! an optional volume from whatever body that provider returns; unrecognized
//! shapes are request failures and rotate to the next endpoint.

use crate::error::{FeedError, FeedResult};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tickflow_core::Tick;
use tracing::debug;

/// Default timeout for poll requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One configured polling endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollEndpoint {
    /// Display name, used as the tick `source_id` (e.g., "CoinGecko").
    pub name: String,
    /// GET URL returning a JSON body.
    pub url: String,
    /// JSON pointer to the price field (e.g., "/bitcoin/usd").
    pub price_pointer: String,
    /// JSON pointer to the volume field; volume is 0 when absent.
    #[serde(default)]
    pub volume_pointer: Option<String>,
}

/// Client for the polling fallback feed.
pub struct PollClient {
    client: Client,
    endpoints: Vec<PollEndpoint>,
    symbol: String,
}

impl PollClient {
    /// Create a new poll client over an ordered, non-empty endpoint list.
    pub fn new(endpoints: Vec<PollEndpoint>, symbol: impl Into<String>) -> FeedResult<Self> {
        if endpoints.is_empty() {
            return Err(FeedError::NoPollEndpoints);
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FeedError::ConnectionFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoints,
            symbol: symbol.into(),
        })
    }

    /// Number of configured endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Endpoint name for an index (indices are always taken modulo N).
    pub fn endpoint_name(&self, index: usize) -> &str {
        &self.endpoints[index % self.endpoints.len()].name
    }

    /// Fetch one quote from the endpoint at `index` and normalize it.
    pub async fn fetch(&self, index: usize) -> FeedResult<Tick> {
        let endpoint = &self.endpoints[index % self.endpoints.len()];
        debug!(endpoint = %endpoint.name, url = %endpoint.url, "Polling REST endpoint");

        let response = self.client.get(&endpoint.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::PollStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let (price, volume) = extract_quote(&body, endpoint)?;

        let now = Utc::now();
        Ok(Tick::new(
            self.symbol.clone(),
            price,
            volume,
            now,
            endpoint.name.clone(),
            now.timestamp_millis(),
        )?)
    }
}

/// Apply an endpoint's parse rule to a response body.
///
/// Extracted as a separate function for testability.
fn extract_quote(body: &serde_json::Value, endpoint: &PollEndpoint) -> FeedResult<(f64, f64)> {
    let price = body
        .pointer(&endpoint.price_pointer)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| {
            FeedError::Parse(format!(
                "no numeric value at {} in {} response",
                endpoint.price_pointer, endpoint.name
            ))
        })?;

    let volume = match &endpoint.volume_pointer {
        Some(pointer) => body.pointer(pointer).and_then(|v| v.as_f64()).unwrap_or(0.0),
        None => 0.0,
    };

    Ok((price, volume))
}
