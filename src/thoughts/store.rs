//! Thought Log Store
//!
//! Append-only record of everything the agent thinks. Every append lands in
//! two places: a per-day archive file (the permanent record the agent's
//! memory depends on, never trimmed) and a rolling `latest.jsonl` capped at a
//! fixed number of events so the serving paths stay flat no matter how much
//! history accumulates.
//!
//! Reads always go back to disk: the trading agent appends to the same files
//! from its own process, so caching here would mean serving stale thoughts.

use crate::models::{ThoughtCategory, ThoughtEvent};
use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

const ROLLING_FILE: &str = "latest.jsonl";

#[derive(Debug, Error)]
pub enum StoreError {
    /// The durable medium cannot be read or written. Never swallowed: if
    /// durability can't be guaranteed the caller must be told.
    #[error("thought storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),
    /// Category outside the fixed set, rejected before any write occurs.
    #[error("invalid thought category: {0}")]
    InvalidCategory(String),
}

pub struct ThoughtStore {
    logs_dir: PathBuf,
    capacity: usize,
    // Guards the read-modify-write trim of the rolling file so concurrent
    // axum workers never observe a torn rewrite.
    file_lock: Mutex<()>,
    skipped_records: AtomicU64,
}

impl ThoughtStore {
    /// Open the store, creating the logs directory if needed.
    pub fn open(logs_dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, StoreError> {
        let logs_dir = logs_dir.into();
        fs::create_dir_all(&logs_dir)?;
        Ok(Self {
            logs_dir,
            capacity,
            file_lock: Mutex::new(()),
            skipped_records: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Malformed records skipped on the read path since this store was opened.
    pub fn skipped_records(&self) -> u64 {
        self.skipped_records.load(Ordering::Relaxed)
    }

    /// Append a thought. Durable in both partitions once this returns.
    pub fn append(
        &self,
        category: ThoughtCategory,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<ThoughtEvent, StoreError> {
        let now = Utc::now();
        // Truncate to millisecond precision so the in-memory event is
        // identical to what reads parse back from the file.
        let timestamp = now
            .with_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
            .unwrap_or(now);

        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();

        let event = ThoughtEvent {
            id: format!("t_{}_{}", timestamp.timestamp_millis(), suffix),
            timestamp,
            category,
            content: content.to_string(),
            metadata,
        };

        let line = serde_json::to_string(&event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let _guard = self.file_lock.lock();
        append_line(&self.day_file(timestamp), &line)?;
        append_line(&self.rolling_file(), &line)?;
        self.trim_rolling()?;

        Ok(event)
    }

    /// Append with a string category: the write path for callers that don't
    /// hold a `ThoughtCategory` (the CLI). Rejected before any write.
    pub fn append_str(
        &self,
        category: &str,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<ThoughtEvent, StoreError> {
        let category = ThoughtCategory::from_str(category)
            .ok_or_else(|| StoreError::InvalidCategory(category.to_string()))?;
        self.append(category, content, metadata)
    }

    pub fn signal(&self, content: &str, meta: Map<String, Value>) -> Result<ThoughtEvent, StoreError> {
        self.append(ThoughtCategory::Signal, content, meta)
    }

    pub fn decision(&self, content: &str, meta: Map<String, Value>) -> Result<ThoughtEvent, StoreError> {
        self.append(ThoughtCategory::Decision, content, meta)
    }

    pub fn reflection(&self, content: &str, meta: Map<String, Value>) -> Result<ThoughtEvent, StoreError> {
        self.append(ThoughtCategory::Reflection, content, meta)
    }

    pub fn trade(&self, content: &str, meta: Map<String, Value>) -> Result<ThoughtEvent, StoreError> {
        self.append(ThoughtCategory::Trade, content, meta)
    }

    pub fn observation(&self, content: &str, meta: Map<String, Value>) -> Result<ThoughtEvent, StoreError> {
        self.append(ThoughtCategory::Observation, content, meta)
    }

    pub fn system(&self, content: &str, meta: Map<String, Value>) -> Result<ThoughtEvent, StoreError> {
        self.append(ThoughtCategory::System, content, meta)
    }

    /// Most recent thoughts, newest first. Filters by category *before*
    /// truncating to `limit`, so a filtered read still returns up to `limit`
    /// matching events even when other categories dominate the window.
    pub fn recent(
        &self,
        limit: usize,
        category: Option<ThoughtCategory>,
    ) -> Result<Vec<ThoughtEvent>, StoreError> {
        let _guard = self.file_lock.lock();
        let path = self.rolling_file();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let mut thoughts: Vec<ThoughtEvent> = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(event) => thoughts.push(event),
                Err(e) => {
                    // Availability over completeness: one corrupt record must
                    // never take down the feed. Counted so the loss is visible.
                    self.skipped_records.fetch_add(1, Ordering::Relaxed);
                    debug!("skipping malformed thought record: {}", e);
                }
            }
        }

        if let Some(cat) = category {
            thoughts.retain(|t| t.category == cat);
        }

        let start = thoughts.len().saturating_sub(limit);
        let mut recent = thoughts.split_off(start);
        recent.reverse();
        Ok(recent)
    }

    /// All thoughts strictly newer than `cutoff`, newest first. The only
    /// primitive the live feed needs.
    pub fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<ThoughtEvent>, StoreError> {
        let mut thoughts = self.recent(self.capacity, None)?;
        thoughts.retain(|t| t.timestamp > cutoff);
        Ok(thoughts)
    }

    fn rolling_file(&self) -> PathBuf {
        self.logs_dir.join(ROLLING_FILE)
    }

    fn day_file(&self, ts: DateTime<Utc>) -> PathBuf {
        self.logs_dir.join(format!("{}.jsonl", ts.format("%Y-%m-%d")))
    }

    // Caller holds `file_lock`.
    fn trim_rolling(&self) -> Result<(), StoreError> {
        let path = self.rolling_file();
        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() <= self.capacity {
            return Ok(());
        }

        let keep = &lines[lines.len() - self.capacity..];
        let mut trimmed = keep.join("\n");
        trimmed.push('\n');
        fs::write(&path, trimmed)?;
        debug!(
            "trimmed rolling log to {} of {} entries",
            self.capacity,
            lines.len()
        );
        Ok(())
    }
}

fn append_line(path: &Path, line: &str) -> Result<(), StoreError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write of one complete record: readers never see a partial event.
    file.write_all(format!("{line}\n").as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_store(capacity: usize) -> (ThoughtStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ThoughtStore::open(dir.path(), capacity).unwrap();
        (store, dir)
    }

    fn meta(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_append_and_recent_round_trip() {
        let (store, _dir) = create_test_store(1000);

        let appended = store
            .trade(
                "BTC $80k NO executed",
                meta(json!({"market": "x", "shares": 705.87, "flags": ["a", "b"]})),
            )
            .unwrap();
        assert!(appended.id.starts_with("t_"));

        let read = store.recent(1, None).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].id, appended.id);
        assert_eq!(read[0].timestamp, appended.timestamp);
        assert_eq!(read[0].category, ThoughtCategory::Trade);
        assert_eq!(read[0].content, "BTC $80k NO executed");
        assert_eq!(read[0].metadata, appended.metadata);
    }

    #[test]
    fn test_recent_returns_reverse_append_order() {
        let (store, _dir) = create_test_store(1000);

        let mut ids = Vec::new();
        for i in 0..5 {
            let ev = store
                .observation(&format!("obs {i}"), Map::new())
                .unwrap();
            ids.push(ev.id);
        }

        let read = store.recent(5, None).unwrap();
        assert_eq!(read.len(), 5);
        let read_ids: Vec<String> = read.into_iter().map(|t| t.id).collect();
        ids.reverse();
        assert_eq!(read_ids, ids);
    }

    #[test]
    fn test_rolling_window_evicts_oldest_archive_keeps_all() {
        let (store, dir) = create_test_store(5);

        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(store.system(&format!("s{i}"), Map::new()).unwrap().id);
        }

        let rolling = store.recent(100, None).unwrap();
        assert_eq!(rolling.len(), 5);
        // Oldest evicted, newest retained.
        assert!(!rolling.iter().any(|t| t.id == ids[0]));
        assert_eq!(rolling[0].id, ids[5]);

        // Archive partition still holds all six.
        let day_file = dir
            .path()
            .join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")));
        let archived = fs::read_to_string(day_file).unwrap();
        assert_eq!(archived.lines().count(), 6);
    }

    #[test]
    fn test_category_filter_then_truncate() {
        let (store, _dir) = create_test_store(1000);

        let t1 = store.trade("trade one", Map::new()).unwrap();
        let t2 = store.trade("trade two", Map::new()).unwrap();
        // More recent non-trade noise must not crowd the filtered window.
        for i in 0..4 {
            store.signal(&format!("sig {i}"), Map::new()).unwrap();
        }

        let trades = store.recent(2, Some(ThoughtCategory::Trade)).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].id, t2.id);
        assert_eq!(trades[1].id, t1.id);
        assert!(trades.iter().all(|t| t.category == ThoughtCategory::Trade));
    }

    #[test]
    fn test_since_is_strict_and_never_redelivers() {
        let (store, _dir) = create_test_store(1000);

        let a = store.decision("a", Map::new()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let b = store.decision("b", Map::new()).unwrap();

        let newer = store.since(a.timestamp).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].id, b.id);

        // Advancing the cursor to the latest delivered timestamp yields nothing.
        assert!(store.since(b.timestamp).unwrap().is_empty());
    }

    #[test]
    fn test_empty_store_reads_empty() {
        let (store, _dir) = create_test_store(1000);
        assert!(store.recent(100, None).unwrap().is_empty());
        assert!(store.since(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_record_skipped_and_counted() {
        let (store, dir) = create_test_store(1000);

        store.reflection("good one", Map::new()).unwrap();
        let rolling = dir.path().join(ROLLING_FILE);
        let mut content = fs::read_to_string(&rolling).unwrap();
        content.push_str("{not json at all\n");
        fs::write(&rolling, content).unwrap();
        store.reflection("good two", Map::new()).unwrap();

        let read = store.recent(100, None).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(store.skipped_records(), 1);
    }

    #[test]
    fn test_invalid_category_rejected_before_write() {
        let (store, dir) = create_test_store(1000);

        let err = store.append_str("prophecy", "nope", Map::new()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidCategory(_)));
        assert!(!dir.path().join(ROLLING_FILE).exists());

        store.append_str("trade", "ok", Map::new()).unwrap();
        assert_eq!(store.recent(10, None).unwrap().len(), 1);
    }
}
