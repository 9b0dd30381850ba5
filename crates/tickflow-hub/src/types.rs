//! Subscriber wire frames.
//!
//! These types are serialized as JSON text frames on the subscriber
//! WebSocket.

use serde::{Deserialize, Serialize};
use tickflow_core::SummaryRecord;

/// Frames sent to subscribers (tagged enum for type safety).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Most recent persisted summary, sent once immediately after connect
    /// (only if a record exists).
    LatestData { data: SummaryRecord },
    /// Live summary, sent to every subscriber on each aggregation firing.
    AggregatedData { data: SummaryRecord },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record() -> SummaryRecord {
        SummaryRecord {
            symbol: "BTCUSD".to_string(),
            mean_price: 50000.0,
            total_volume: 3.5,
            moving_average: 50010.0,
            observed_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            sample_count: 12,
            source_id: "WebSocket".to_string(),
        }
    }

    #[test]
    fn test_frame_tagging() {
        let latest = serde_json::to_string(&ClientFrame::LatestData { data: record() }).unwrap();
        assert!(latest.contains("\"type\":\"latest_data\""));

        let live =
            serde_json::to_string(&ClientFrame::AggregatedData { data: record() }).unwrap();
        assert!(live.contains("\"type\":\"aggregated_data\""));
    }

    #[test]
    fn test_frame_carries_wire_record_fields() {
        let json: serde_json::Value =
            serde_json::to_value(ClientFrame::AggregatedData { data: record() }).unwrap();
        assert_eq!(json["data"]["price"], 50000.0);
        assert_eq!(json["data"]["dataPoints"], 12);
        assert_eq!(json["data"]["source"], "WebSocket");
    }
}
