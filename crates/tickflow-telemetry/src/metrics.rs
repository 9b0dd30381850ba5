//! Prometheus metrics for the aggregation engine.
//!
//! Covers the engine's observable surface:
//! - Feed transport state and ingestion volume
//! - Aggregation output and persistence failures
//! - Subscriber count and broadcast fan-out
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, GaugeVec, IntCounter, IntGauge, TextEncoder,
};

/// Feed transport state machine current state.
/// Labels: state (connecting/live/polling)
pub static FEED_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tickflow_feed_state",
        "Feed transport state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total ticks ingested into the buffer, by source.
pub static TICKS_INGESTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickflow_ticks_ingested_total",
        "Total ticks ingested into the buffer",
        &["source"]
    )
    .unwrap()
});

/// Total payloads dropped before reaching the buffer, by reason.
pub static PAYLOADS_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tickflow_payloads_dropped_total",
        "Total payloads dropped before reaching the buffer",
        &["reason"]
    )
    .unwrap()
});

/// Total poll endpoint rotations.
pub static POLL_ROTATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickflow_poll_rotations_total",
        "Total polling endpoint rotations after request or parse failure"
    )
    .unwrap()
});

/// Total summary records emitted by the aggregator.
pub static SUMMARIES_EMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickflow_summaries_emitted_total",
        "Total summary records emitted by the aggregator"
    )
    .unwrap()
});

/// Total store append failures (logged and swallowed).
pub static STORE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickflow_store_failures_total",
        "Total summary store append failures"
    )
    .unwrap()
});

/// Currently connected subscribers.
pub static SUBSCRIBERS_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tickflow_subscribers_connected",
        "Currently connected WebSocket subscribers"
    )
    .unwrap()
});

/// Total frames delivered to subscribers.
pub static BROADCAST_SENDS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickflow_broadcast_sends_total",
        "Total frames delivered to subscribers"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set feed transport state.
    /// Only the active state should be set to 1, all others to 0.
    pub fn feed_state_set(state: &str) {
        for s in &["connecting", "live", "polling"] {
            FEED_STATE.with_label_values(&[s]).set(0.0);
        }
        FEED_STATE.with_label_values(&[state]).set(1.0);
    }

    /// Record a tick ingested into the buffer.
    pub fn tick_ingested(source: &str) {
        TICKS_INGESTED_TOTAL.with_label_values(&[source]).inc();
    }

    /// Record a payload dropped before the buffer.
    pub fn payload_dropped(reason: &str) {
        PAYLOADS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a polling endpoint rotation.
    pub fn poll_rotated() {
        POLL_ROTATIONS_TOTAL.inc();
    }

    /// Record a summary record emitted.
    pub fn summary_emitted() {
        SUMMARIES_EMITTED_TOTAL.inc();
    }

    /// Record a store append failure.
    pub fn store_failure() {
        STORE_FAILURES_TOTAL.inc();
    }

    /// Record a subscriber connecting.
    pub fn subscriber_connected() {
        SUBSCRIBERS_CONNECTED.inc();
    }

    /// Record a subscriber disconnecting.
    pub fn subscriber_disconnected() {
        SUBSCRIBERS_CONNECTED.dec();
    }

    /// Record frames delivered during a broadcast.
    pub fn broadcast_sent(count: u64) {
        BROADCAST_SENDS_TOTAL.inc_by(count);
    }
}

/// Render all registered metrics in the Prometheus text format.
pub fn render_metrics() -> String {
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
