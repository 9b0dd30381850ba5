//! Bounded rolling tick buffer.
//!
//! Append-only from the ingestion path; read (non-destructively) and pruned
//! only by the aggregator on its timer. The buffer itself carries no locking;
//! callers serialize access through the shared mutex.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tickflow_core::Tick;

/// Shared handle used by the ingestion path and the aggregator.
pub type SharedTickBuffer = Arc<Mutex<TickBuffer>>;

/// Fixed-capacity rolling store of raw ticks, oldest dropped on overflow.
#[derive(Debug)]
pub struct TickBuffer {
    ticks: VecDeque<Tick>,
    capacity: usize,
}

impl TickBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ticks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Wrap a new buffer in the shared handle.
    pub fn shared(capacity: usize) -> SharedTickBuffer {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Unconditionally insert, evicting the oldest entries while over capacity.
    pub fn append(&mut self, tick: Tick) {
        self.ticks.push_back(tick);
        while self.ticks.len() > self.capacity {
            self.ticks.pop_front();
        }
    }

    /// All entries with `observed_at >= cutoff`, insertion order, no mutation.
    pub fn snapshot_since(&self, cutoff: DateTime<Utc>) -> Vec<Tick> {
        self.ticks
            .iter()
            .filter(|t| t.observed_at >= cutoff)
            .cloned()
            .collect()
    }

    /// Remove entries with `observed_at < cutoff`. Called only by the
    /// aggregator, after its snapshot for the window has been taken.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) {
        self.ticks.retain(|t| t.observed_at >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}
