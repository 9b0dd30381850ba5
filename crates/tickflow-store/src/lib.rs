//! Summary record persistence.
//!
//! The engine consumes persistence through the [`SummaryStore`] trait so the
//! concrete technology stays swappable and tests can substitute doubles.
//! The shipped implementation is JSON Lines (`.jsonl`) for robustness:
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Can be read even if write was interrupted

pub mod error;
pub mod jsonl;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use jsonl::JsonLinesStore;
pub use memory::MemoryStore;

use tickflow_core::SummaryRecord;

/// Persistence seam consumed by the aggregator and the broadcast hub.
///
/// `most_recent` returns records newest first. Both operations are expected
/// to be cheap; callers treat failures as non-fatal.
pub trait SummaryStore: Send + Sync {
    /// Append one summary record.
    fn append(&self, record: &SummaryRecord) -> StoreResult<()>;

    /// Fetch up to `n` most recent records, newest first.
    fn most_recent(&self, n: usize) -> StoreResult<Vec<SummaryRecord>>;
}
