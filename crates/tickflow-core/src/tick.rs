//! Raw trade tick type.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed trade from the venue.
///
/// A tick only exists once it has passed validation; malformed trades are
/// rejected before they can reach the buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument symbol (e.g., "BTCUSD").
    pub symbol: String,
    /// Trade price. Finite and non-negative.
    pub price: f64,
    /// Trade volume. Finite and non-negative.
    pub volume: f64,
    /// When the trade was observed.
    pub observed_at: DateTime<Utc>,
    /// Identifier of the transport that produced this tick
    /// (e.g., "WebSocket" or a polling endpoint name).
    pub source_id: String,
    /// Monotonic-ish identifier from the source. Display only; the engine
    /// makes no ordering guarantees based on it.
    pub sequence_id: i64,
}

impl Tick {
    /// Validating constructor.
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        volume: f64,
        observed_at: DateTime<Utc>,
        source_id: impl Into<String>,
        sequence_id: i64,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(CoreError::MissingSymbol);
        }
        if !price.is_finite() || price < 0.0 {
            return Err(CoreError::InvalidPrice(price.to_string()));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(CoreError::InvalidVolume(volume.to_string()));
        }

        Ok(Self {
            symbol,
            price,
            volume,
            observed_at,
            source_id: source_id.into(),
            sequence_id,
        })
    }
}
