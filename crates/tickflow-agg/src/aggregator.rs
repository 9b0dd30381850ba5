//! Window aggregation task.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tickflow_core::{SummaryRecord, Tick};
use tickflow_feed::SharedTickBuffer;
use tickflow_hub::BroadcastHub;
use tickflow_store::SummaryStore;
use tickflow_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Guard bound on a single store append; a hanging store must not pile up
/// blocked writers forever.
const STORE_WRITE_GUARD: Duration = Duration::from_secs(5);

/// Aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Aggregation window W in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Trailing sub-window size for the moving average.
    #[serde(default = "default_moving_average_window")]
    pub moving_average_window: usize,
}

fn default_window_secs() -> u64 {
    60
}

fn default_moving_average_window() -> usize {
    10
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            moving_average_window: default_moving_average_window(),
        }
    }
}

/// Reduce one window's ticks into a summary record.
///
/// Callers guarantee `ticks` is non-empty. The moving average covers the
/// last `min(ma_window, n)` entries in original order; symbol and source
/// are taken from the first entry.
pub fn summarize(
    ticks: &[Tick],
    window_close: DateTime<Utc>,
    ma_window: usize,
) -> SummaryRecord {
    let n = ticks.len();
    let mean_price = ticks.iter().map(|t| t.price).sum::<f64>() / n as f64;
    let total_volume = ticks.iter().map(|t| t.volume).sum::<f64>();

    // Clamped to at least one sample
    let ma_n = ma_window.min(n).max(1);
    let moving_average = ticks[n - ma_n..].iter().map(|t| t.price).sum::<f64>() / ma_n as f64;

    let first = &ticks[0];
    SummaryRecord {
        symbol: first.symbol.clone(),
        mean_price,
        total_volume,
        moving_average,
        observed_at: window_close,
        sample_count: n,
        source_id: first.source_id.clone(),
    }
}

/// Window aggregation task.
pub struct Aggregator {
    config: AggregatorConfig,
    buffer: SharedTickBuffer,
    store: Arc<dyn SummaryStore>,
    hub: Arc<BroadcastHub>,
    shutdown: CancellationToken,
}

impl Aggregator {
    /// Create a new aggregator.
    pub fn new(
        config: AggregatorConfig,
        buffer: SharedTickBuffer,
        store: Arc<dyn SummaryStore>,
        hub: Arc<BroadcastHub>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            buffer,
            store,
            hub,
            shutdown,
        }
    }

    /// Run the aggregation timer until shutdown. In-flight persistence is
    /// not awaited on cancellation; partial work is discarded.
    pub async fn run(&self) {
        info!(
            window_secs = self.config.window_secs,
            "Starting aggregation timer"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(self.config.window_secs));
        // The interval fires immediately; the first real window closes one
        // period from now.
        interval.tick().await;

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping aggregation timer");
                    return;
                }
                _ = interval.tick() => {
                    self.aggregate_once(Utc::now());
                }
            }
        }
    }

    /// Run one aggregation firing for the window closing at `now`.
    ///
    /// Returns the emitted record, or `None` for an empty window (which is
    /// not an error: nothing is persisted or broadcast).
    pub fn aggregate_once(&self, now: DateTime<Utc>) -> Option<SummaryRecord> {
        let cutoff = now - ChronoDuration::seconds(self.config.window_secs as i64);

        let recent = self.buffer.lock().snapshot_since(cutoff);
        if recent.is_empty() {
            debug!("No ticks in window, skipping aggregation");
            return None;
        }

        let record = summarize(&recent, now, self.config.moving_average_window);
        debug!(
            samples = record.sample_count,
            mean_price = record.mean_price,
            source = %record.source_id,
            "Window aggregated"
        );

        // Persistence is fire-and-forget: a slow or failing store must not
        // stall the timer, and the in-memory record is still broadcast.
        self.persist(record.clone());
        self.hub.publish(&record);

        // Prune only after the snapshot has been fully consumed
        self.buffer.lock().prune_before(cutoff);

        Metrics::summary_emitted();
        Some(record)
    }

    fn persist(&self, record: SummaryRecord) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let write = tokio::task::spawn_blocking(move || store.append(&record));
            match tokio::time::timeout(STORE_WRITE_GUARD, write).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    warn!(error = %e, "Failed to persist summary record");
                    Metrics::store_failure();
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Summary persistence task failed");
                    Metrics::store_failure();
                }
                Err(_) => {
                    warn!(
                        guard_secs = STORE_WRITE_GUARD.as_secs(),
                        "Summary persistence exceeded guard timeout, abandoning write"
                    );
                    Metrics::store_failure();
                }
            }
        });
    }
}
