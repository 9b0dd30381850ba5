//! In-memory summary store for tests and ephemeral runs.

use crate::error::StoreResult;
use crate::SummaryStore;
use parking_lot::RwLock;
use tickflow_core::SummaryRecord;

/// Stores records in a vector, insertion order.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<SummaryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl SummaryStore for MemoryStore {
    fn append(&self, record: &SummaryRecord) -> StoreResult<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    fn most_recent(&self, n: usize) -> StoreResult<Vec<SummaryRecord>> {
        Ok(self.records.read().iter().rev().take(n).cloned().collect())
    }
}
