//! Broadcast hub core.

use crate::types::ClientFrame;
use dashmap::DashMap;
use std::sync::Arc;
use tickflow_core::SummaryRecord;
use tickflow_store::SummaryStore;
use tickflow_telemetry::Metrics;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Opaque subscriber connection identifier.
pub type SubscriberId = Uuid;

/// Maintains the live subscriber set and fans summaries out to it.
///
/// Each subscriber is an unbounded channel sender; the transport side drains
/// the channel into the socket, so a slow subscriber never blocks a publish.
pub struct BroadcastHub {
    subscribers: DashMap<SubscriberId, mpsc::UnboundedSender<String>>,
    store: Arc<dyn SummaryStore>,
}

impl BroadcastHub {
    /// Create a new hub over the summary store.
    pub fn new(store: Arc<dyn SummaryStore>) -> Self {
        Self {
            subscribers: DashMap::new(),
            store,
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Add a connection to the subscriber set, then push the most recent
    /// persisted summary to it alone. If no record exists yet, the snapshot
    /// push is a no-op.
    pub fn register(&self, id: SubscriberId, sender: mpsc::UnboundedSender<String>) {
        self.subscribers.insert(id, sender.clone());
        Metrics::subscriber_connected();
        info!(subscriber = %id, total = self.subscribers.len(), "Subscriber registered");

        match self.store.most_recent(1) {
            Ok(records) => {
                if let Some(latest) = records.into_iter().next() {
                    let frame = ClientFrame::LatestData { data: latest };
                    match serde_json::to_string(&frame) {
                        Ok(payload) => {
                            if sender.send(payload).is_err() {
                                debug!(subscriber = %id, "Subscriber gone before snapshot push");
                                self.unregister(id);
                            } else {
                                Metrics::broadcast_sent(1);
                            }
                        }
                        Err(e) => error!(error = %e, "Failed to serialize latest summary"),
                    }
                }
            }
            Err(e) => {
                // Storage outage: the subscriber stays registered and will
                // receive live summaries as they are produced.
                warn!(error = %e, "Failed to load latest summary for new subscriber");
            }
        }
    }

    /// Remove a connection from the subscriber set. Idempotent.
    pub fn unregister(&self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            Metrics::subscriber_disconnected();
            info!(subscriber = %id, total = self.subscribers.len(), "Subscriber removed");
        }
    }

    /// Serialize the record once and deliver the identical payload to every
    /// registered connection. A failed delivery drops that connection and
    /// does not interrupt delivery to the rest.
    pub fn publish(&self, record: &SummaryRecord) {
        let frame = ClientFrame::AggregatedData {
            data: record.clone(),
        };
        let payload = match serde_json::to_string(&frame) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Failed to serialize summary frame");
                return;
            }
        };

        let mut delivered = 0u64;
        let mut dead = Vec::new();
        for entry in self.subscribers.iter() {
            if entry.value().send(payload.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.unregister(id);
        }

        Metrics::broadcast_sent(delivered);
        debug!(
            delivered,
            subscribers = self.subscribers.len(),
            "Broadcast summary to subscribers"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tickflow_store::MemoryStore;

    fn record(price: f64) -> SummaryRecord {
        SummaryRecord {
            symbol: "BTCUSD".to_string(),
            mean_price: price,
            total_volume: 1.0,
            moving_average: price,
            observed_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            sample_count: 3,
            source_id: "WebSocket".to_string(),
        }
    }

    fn frame_type(payload: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_register_without_history_sends_nothing() {
        let hub = BroadcastHub::new(Arc::new(MemoryStore::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        hub.register(Uuid::new_v4(), tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_register_with_history_sends_exactly_one_latest_frame() {
        let store = Arc::new(MemoryStore::new());
        store.append(&record(50000.0)).unwrap();
        let hub = BroadcastHub::new(store);
        let (tx, mut rx) = mpsc::unbounded_channel();

        hub.register(Uuid::new_v4(), tx);

        let payload = rx.try_recv().unwrap();
        assert_eq!(frame_type(&payload), "latest_data");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["data"]["price"], 50000.0);
        // No further frames until the next publish
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let hub = BroadcastHub::new(Arc::new(MemoryStore::new()));
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.register(Uuid::new_v4(), tx1);
        hub.register(Uuid::new_v4(), tx2);

        hub.publish(&record(50100.0));

        assert_eq!(frame_type(&rx1.try_recv().unwrap()), "aggregated_data");
        assert_eq!(frame_type(&rx2.try_recv().unwrap()), "aggregated_data");
    }

    #[test]
    fn test_dead_subscriber_does_not_block_the_rest() {
        let hub = BroadcastHub::new(Arc::new(MemoryStore::new()));
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.register(Uuid::new_v4(), tx1);
        hub.register(Uuid::new_v4(), tx2);

        // First subscriber hangs up mid-flight
        drop(rx1);
        hub.publish(&record(50100.0));

        assert_eq!(frame_type(&rx2.try_recv().unwrap()), "aggregated_data");
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let hub = BroadcastHub::new(Arc::new(MemoryStore::new()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        hub.register(id, tx);

        hub.unregister(id);
        hub.unregister(id);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
