//! JSON Lines summary store.
//!
//! Appends one JSON object per line to a daily-rotated file, flushing after
//! every record. A bounded in-memory tail serves `most_recent` queries; on
//! open, the tail is rehydrated from the current day's file so a restarted
//! process can still answer "latest summary" for new subscribers.

use crate::error::StoreResult;
use crate::SummaryStore;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tickflow_core::SummaryRecord;
use tracing::{debug, info, warn};

/// Active writer state for daily file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

struct Inner {
    active_writer: Option<ActiveWriter>,
    /// Most recent records, oldest first, bounded by `cache_size`.
    tail: VecDeque<SummaryRecord>,
}

/// JSON Lines store for summary records.
///
/// Uses append mode - safe for interrupted writes.
/// Each line is independent, so partial corruption only affects that line.
pub struct JsonLinesStore {
    base_dir: PathBuf,
    cache_size: usize,
    inner: Mutex<Inner>,
}

impl JsonLinesStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed
    /// and rehydrating the in-memory tail from today's file.
    pub fn open(base_dir: impl Into<PathBuf>, cache_size: usize) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let tail = load_tail(&file_path(&base_dir, &today), cache_size);
        if !tail.is_empty() {
            info!(records = tail.len(), "Rehydrated summary tail from disk");
        }

        Ok(Self {
            base_dir,
            cache_size,
            inner: Mutex::new(Inner {
                active_writer: None,
                tail,
            }),
        })
    }

    fn close_active_writer(inner: &mut Inner) {
        if let Some(mut active) = inner.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush writer on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines writer"
            );
        }
    }

    fn create_new_writer(&self, inner: &mut Inner, date: &str) -> StoreResult<()> {
        let filename = file_path(&self.base_dir, date);
        info!(filename = %filename.display(), "Opening JSON Lines writer (append mode)");

        // Open in append mode - won't truncate existing data
        let file = OpenOptions::new().create(true).append(true).open(&filename)?;

        inner.active_writer = Some(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        });

        Ok(())
    }
}

impl SummaryStore for JsonLinesStore {
    fn append(&self, record: &SummaryRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let today = Utc::now().format("%Y-%m-%d").to_string();

        // Rotate writer on date change
        let needs_rotation = inner
            .active_writer
            .as_ref()
            .map(|w| w.date != today)
            .unwrap_or(false);
        if needs_rotation {
            Self::close_active_writer(&mut inner);
        }

        if inner.active_writer.is_none() {
            self.create_new_writer(&mut inner, &today)?;
        }

        let json = serde_json::to_string(record)?;
        {
            let active = inner
                .active_writer
                .as_mut()
                .expect("active_writer should exist");
            writeln!(active.writer, "{}", json)?;
            // Flush to disk immediately
            active.writer.flush()?;
            active.records_written += 1;
        }

        inner.tail.push_back(record.clone());
        while inner.tail.len() > self.cache_size {
            inner.tail.pop_front();
        }

        debug!(date = %today, symbol = %record.symbol, "Appended summary record");
        Ok(())
    }

    fn most_recent(&self, n: usize) -> StoreResult<Vec<SummaryRecord>> {
        let inner = self.inner.lock();
        Ok(inner.tail.iter().rev().take(n).cloned().collect())
    }
}

impl Drop for JsonLinesStore {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        Self::close_active_writer(&mut inner);
    }
}

fn file_path(base_dir: &Path, date: &str) -> PathBuf {
    base_dir.join(format!("summaries_{}.jsonl", date))
}

/// Read the last `cache_size` parseable records from a daily file.
/// Unparseable lines are skipped; a truncated final line is not an error.
fn load_tail(path: &Path, cache_size: usize) -> VecDeque<SummaryRecord> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return VecDeque::new(),
    };

    let mut tail = VecDeque::new();
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(?e, "Failed to read summary line, stopping rehydration");
                break;
            }
        };
        match serde_json::from_str::<SummaryRecord>(&line) {
            Ok(record) => {
                tail.push_back(record);
                if tail.len() > cache_size {
                    tail.pop_front();
                }
            }
            Err(e) => {
                warn!(?e, "Skipping unparseable summary line");
            }
        }
    }
    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn make_test_record(id: i64) -> SummaryRecord {
        SummaryRecord {
            symbol: "BTCUSD".to_string(),
            mean_price: 50000.0 + id as f64,
            total_volume: 1.5,
            moving_average: 50000.5,
            observed_at: Utc.timestamp_millis_opt(1717243200000 + id).unwrap(),
            sample_count: 10,
            source_id: "WebSocket".to_string(),
        }
    }

    #[test]
    fn test_append_and_most_recent() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path(), 100).unwrap();

        for i in 0..5 {
            store.append(&make_test_record(i)).unwrap();
        }

        let recent = store.most_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first
        assert_eq!(recent[0].mean_price, 50004.0);
        assert_eq!(recent[1].mean_price, 50003.0);
    }

    #[test]
    fn test_round_trip_single_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path(), 100).unwrap();

        let record = make_test_record(7);
        store.append(&record).unwrap();

        let fetched = store.most_recent(1).unwrap();
        assert_eq!(fetched, vec![record]);
    }

    #[test]
    fn test_rehydrates_tail_after_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = JsonLinesStore::open(temp_dir.path(), 100).unwrap();
            for i in 0..3 {
                store.append(&make_test_record(i)).unwrap();
            }
        }

        // Reopen: records written by the first instance are visible
        let store = JsonLinesStore::open(temp_dir.path(), 100).unwrap();
        let recent = store.most_recent(10).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].mean_price, 50002.0);

        // And appends keep going into the same file
        store.append(&make_test_record(3)).unwrap();
        assert_eq!(store.most_recent(10).unwrap().len(), 4);
    }

    #[test]
    fn test_tail_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path(), 3).unwrap();

        for i in 0..10 {
            store.append(&make_test_record(i)).unwrap();
        }

        let recent = store.most_recent(10).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].mean_price, 50009.0);
    }

    #[test]
    fn test_unparseable_lines_skipped_on_rehydration() {
        let temp_dir = TempDir::new().unwrap();
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = temp_dir.path().join(format!("summaries_{}.jsonl", date));

        let mut content = serde_json::to_string(&make_test_record(1)).unwrap();
        content.push('\n');
        content.push_str("{not json\n");
        content.push_str(&serde_json::to_string(&make_test_record(2)).unwrap());
        content.push('\n');
        std::fs::write(&path, content).unwrap();

        let store = JsonLinesStore::open(temp_dir.path(), 100).unwrap();
        assert_eq!(store.most_recent(10).unwrap().len(), 2);
    }

    #[test]
    fn test_most_recent_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path(), 100).unwrap();
        assert!(store.most_recent(1).unwrap().is_empty());
    }
}
