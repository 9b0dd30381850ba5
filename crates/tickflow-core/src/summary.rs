//! Aggregation-window summary record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One aggregation-window result.
///
/// The serde renames map the Rust field names onto the wire contract consumed
/// by subscribers and stored in the summary log: `price`, `volume`,
/// `movingAverage`, `timestamp` (ISO-8601), `dataPoints`, `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Instrument symbol.
    pub symbol: String,
    /// Mean trade price over the window.
    #[serde(rename = "price")]
    pub mean_price: f64,
    /// Total traded volume over the window.
    #[serde(rename = "volume")]
    pub total_volume: f64,
    /// Trailing sub-window mean of price (at most the last 10 samples).
    #[serde(rename = "movingAverage")]
    pub moving_average: f64,
    /// Window-close timestamp.
    #[serde(rename = "timestamp")]
    pub observed_at: DateTime<Utc>,
    /// Number of ticks reduced into this record. Always >= 1.
    #[serde(rename = "dataPoints")]
    pub sample_count: usize,
    /// Source of the window's samples.
    #[serde(rename = "source")]
    pub source_id: String,
}
