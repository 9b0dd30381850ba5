//! Fixed-window tick aggregation.
//!
//! The aggregator fires on a steady timer, reduces the buffer's recent
//! window into one summary record, persists it fire-and-forget, and hands
//! it to the broadcast hub.

pub mod aggregator;

pub use aggregator::{summarize, Aggregator, AggregatorConfig};
