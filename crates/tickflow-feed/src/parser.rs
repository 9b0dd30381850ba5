//! Payload parsing for the live feed.
//!
//! Normalizes venue messages into validated [`Tick`]s.
//!
//! Supports two payload shapes:
//! 1. Venue trade event: `{"e":"trade","s":"BTCUSDT","p":"...","q":"...","T":...,"t":...}`
//! 2. Normalized trade: `{"symbol":...,"price":...,"volume":...,"timestamp":...,"tradeId":...}`

use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tickflow_core::Tick;

/// Source identifier attached to ticks from the live push transport.
pub const LIVE_SOURCE_ID: &str = "WebSocket";

/// Ingestion statistics.
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Payloads normalized into ticks.
    pub accepted_count: AtomicU64,
    /// Payloads dropped (malformed or unrecognized).
    pub dropped_count: AtomicU64,
}

impl IngestStats {
    pub fn record_accepted(&self) {
        self.accepted_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted_count.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }
}

/// Venue trade event. The venue sends numeric values as strings and
/// timestamps as epoch milliseconds.
#[derive(Debug, Deserialize)]
pub struct VenueTradeEvent {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "T")]
    pub trade_time_ms: i64,
    #[serde(rename = "t")]
    pub trade_id: i64,
}

/// Already-normalized trade shape, accepted from any transport.
#[derive(Debug, Deserialize)]
pub struct NormalizedTrade {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "tradeId")]
    pub trade_id: i64,
    #[serde(default)]
    pub source: Option<String>,
}

/// Payload parser for the live feed.
#[derive(Debug, Default)]
pub struct TickParser {
    stats: IngestStats,
}

impl TickParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get ingestion statistics.
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Parse a push-transport payload into a tick.
    ///
    /// Returns `Ok(None)` for recognized-but-irrelevant messages (anything
    /// that is not a trade); those are dropped quietly. Malformed trade
    /// payloads are errors, logged and dropped by the caller without
    /// affecting transport state.
    pub fn parse_push_payload(&self, text: &str) -> FeedResult<Option<Tick>> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                self.stats.record_dropped();
                return Err(e.into());
            }
        };

        let result = if value.get("e").and_then(|v| v.as_str()) == Some("trade") {
            parse_venue_trade(value).map(Some)
        } else if value.get("symbol").is_some() {
            parse_normalized_trade(value).map(Some)
        } else {
            // Not a trade (subscription ack, heartbeat, ...)
            return Ok(None);
        };

        match &result {
            Ok(_) => self.stats.record_accepted(),
            Err(_) => self.stats.record_dropped(),
        }
        result
    }
}

fn parse_venue_trade(value: serde_json::Value) -> FeedResult<Tick> {
    let raw: VenueTradeEvent = serde_json::from_value(value)?;

    let price: f64 = raw
        .price
        .parse()
        .map_err(|_| FeedError::Parse(format!("bad price field: {}", raw.price)))?;
    let volume: f64 = raw
        .quantity
        .parse()
        .map_err(|_| FeedError::Parse(format!("bad quantity field: {}", raw.quantity)))?;
    let observed_at = DateTime::from_timestamp_millis(raw.trade_time_ms)
        .ok_or_else(|| FeedError::Parse(format!("bad trade time: {}", raw.trade_time_ms)))?;

    Ok(Tick::new(
        raw.symbol,
        price,
        volume,
        observed_at,
        LIVE_SOURCE_ID,
        raw.trade_id,
    )?)
}

fn parse_normalized_trade(value: serde_json::Value) -> FeedResult<Tick> {
    let raw: NormalizedTrade = serde_json::from_value(value)?;
    let source = raw.source.unwrap_or_else(|| LIVE_SOURCE_ID.to_string());

    Ok(Tick::new(
        raw.symbol,
        raw.price,
        raw.volume,
        raw.timestamp,
        source,
        raw.trade_id,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_venue_trade_event() {
        let parser = TickParser::new();
        let payload = r#"{"e":"trade","E":1717243200100,"s":"BTCUSDT","t":99,"p":"50000.25","q":"0.004","T":1717243200000}"#;

        let tick = parser.parse_push_payload(payload).unwrap().unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price, 50000.25);
        assert_eq!(tick.volume, 0.004);
        assert_eq!(tick.sequence_id, 99);
        assert_eq!(tick.source_id, LIVE_SOURCE_ID);
        assert_eq!(tick.observed_at.timestamp_millis(), 1717243200000);
        assert_eq!(parser.stats().accepted(), 1);
    }

    #[test]
    fn test_parse_normalized_trade() {
        let parser = TickParser::new();
        let payload = r#"{"symbol":"BTCUSD","price":50100.0,"volume":2.5,"timestamp":"2024-06-01T12:00:00Z","tradeId":7,"source":"CoinGecko"}"#;

        let tick = parser.parse_push_payload(payload).unwrap().unwrap();
        assert_eq!(tick.symbol, "BTCUSD");
        assert_eq!(tick.source_id, "CoinGecko");
        assert_eq!(tick.volume, 2.5);
    }

    #[test]
    fn test_normalized_trade_volume_defaults_to_zero() {
        let parser = TickParser::new();
        let payload = r#"{"symbol":"BTCUSD","price":50100.0,"timestamp":"2024-06-01T12:00:00Z","tradeId":7}"#;

        let tick = parser.parse_push_payload(payload).unwrap().unwrap();
        assert_eq!(tick.volume, 0.0);
        assert_eq!(tick.source_id, LIVE_SOURCE_ID);
    }

    #[test]
    fn test_non_trade_message_is_ignored() {
        let parser = TickParser::new();
        let payload = r#"{"result":null,"id":1}"#;

        assert!(parser.parse_push_payload(payload).unwrap().is_none());
        assert_eq!(parser.stats().accepted(), 0);
        assert_eq!(parser.stats().dropped(), 0);
    }

    #[test]
    fn test_malformed_json_is_error() {
        let parser = TickParser::new();
        assert!(parser.parse_push_payload("{nope").is_err());
        assert_eq!(parser.stats().dropped(), 1);
    }

    #[test]
    fn test_bad_price_string_is_error() {
        let parser = TickParser::new();
        let payload = r#"{"e":"trade","s":"BTCUSDT","t":1,"p":"abc","q":"1.0","T":1717243200000}"#;

        assert!(parser.parse_push_payload(payload).is_err());
        assert_eq!(parser.stats().dropped(), 1);
    }

    #[test]
    fn test_negative_price_rejected_by_validation() {
        let parser = TickParser::new();
        let payload = r#"{"e":"trade","s":"BTCUSDT","t":1,"p":"-5","q":"1.0","T":1717243200000}"#;

        let err = parser.parse_push_payload(payload).unwrap_err();
        assert!(matches!(err, FeedError::InvalidTick(_)));
    }
}
