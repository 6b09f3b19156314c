//! File Store - durable backend for the outbox
//!
//! The store is an append-only JSONL operation log. Each put or delete is
//! one fsynced line; replaying the log on open rebuilds the live set.
//! When most of the log describes records that are already gone, it is
//! rewritten atomically with only the live puts.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::index::PendingIndex;
use super::EventStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{EventId, EventRecord};
use crate::utils::{append_line_synced, atomic_write_with, cleanup_temp_file};

/// Configuration for the FileStore
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
    /// Minimum number of dead log lines before a compaction is considered
    pub compact_threshold: usize,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            compact_threshold: 1000,
        }
    }
}

impl FileStoreConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the compaction threshold
    pub fn with_compact_threshold(mut self, threshold: usize) -> Self {
        self.compact_threshold = threshold;
        self
    }

    /// Get path to outbox.jsonl
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("outbox.jsonl")
    }
}

/// One line of the operation log, as written
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogLine<'a> {
    Put { record: &'a EventRecord },
    Delete { ids: &'a [EventId] },
}

impl LogLine<'_> {
    fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One line of the operation log, as replayed
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogEntry {
    Put { record: EventRecord },
    Delete { ids: Vec<EventId> },
}

impl LogEntry {
    fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[derive(Debug)]
struct FileState {
    index: PendingIndex,
    /// Log lines that no longer describe a live record
    dead_lines: usize,
    /// Set when an append failed and may have left a partial line
    needs_rewrite: bool,
}

/// Durable store backed by an append-only JSONL log
#[derive(Debug, Clone)]
pub struct FileStore {
    config: Arc<FileStoreConfig>,
    state: Arc<Mutex<FileState>>,
}

impl FileStore {
    /// Open the store, replaying any existing log
    ///
    /// A torn trailing line from a crash mid-write is skipped and the log
    /// is rewritten so later appends start on a clean line.
    pub fn open(config: FileStoreConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        if cleanup_temp_file(config.log_path())? {
            warn!("Removed leftover temp file from interrupted compaction");
        }

        let (index, dead_lines, needs_rewrite) = Self::replay(&config.log_path())?;

        info!(
            pending = index.len(),
            dead_lines,
            path = %config.log_path().display(),
            "Opened outbox store"
        );

        let mut state = FileState {
            index,
            dead_lines,
            needs_rewrite,
        };
        if state.needs_rewrite {
            Self::compact(&config, &mut state)?;
        }

        Ok(Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Rebuild the live set from the log
    ///
    /// Returns the index, the number of dead lines and whether the log
    /// holds damaged lines that should be rewritten away.
    fn replay(log_path: &Path) -> StoreResult<(PendingIndex, usize, bool)> {
        let mut index = PendingIndex::new();

        if !log_path.exists() {
            return Ok((index, 0, false));
        }

        let file = File::open(log_path)?;
        let reader = BufReader::new(file);
        let mut total_lines = 0usize;
        let mut skipped = 0usize;

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            total_lines += 1;

            match LogEntry::from_json_line(&line) {
                Ok(LogEntry::Put { record }) => index.insert(record),
                Ok(LogEntry::Delete { ids }) => {
                    index.remove(&ids);
                }
                Err(e) => {
                    warn!(line = line_num + 1, error = %e, "Skipping unreadable outbox log line");
                    skipped += 1;
                }
            }
        }

        let dead_lines = total_lines.saturating_sub(index.len());
        let needs_rewrite = skipped > 0 || !Self::ends_with_newline(log_path)?;

        Ok((index, dead_lines, needs_rewrite))
    }

    fn ends_with_newline(path: &Path) -> StoreResult<bool> {
        if !path.exists() {
            return Ok(true);
        }

        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(true);
        }

        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }

    /// Rewrite the log with only the live records
    fn compact(config: &FileStoreConfig, state: &mut FileState) -> StoreResult<()> {
        let mut lines = Vec::with_capacity(state.index.len());
        for record in state.index.iter() {
            lines.push(LogLine::Put { record }.to_json_line()?);
        }

        atomic_write_with(config.log_path(), |file| {
            for line in &lines {
                writeln!(file, "{}", line)?;
            }
            Ok(())
        })?;

        debug!(
            live = state.index.len(),
            dropped = state.dead_lines,
            "Compacted outbox log"
        );
        state.dead_lines = 0;
        state.needs_rewrite = false;

        Ok(())
    }

    /// Append one log line, first repairing the log if its tail is damaged
    ///
    /// The log is rebuilt from the index when an earlier append failed or
    /// the file no longer ends in a newline, so a new line never merges
    /// into a fragment.
    fn append(&self, state: &mut FileState, line: &str) -> StoreResult<()> {
        let log_path = self.config.log_path();

        if state.needs_rewrite || !Self::ends_with_newline(&log_path)? {
            warn!(path = %log_path.display(), "Repairing damaged outbox log tail");
            Self::compact(&self.config, state)?;
        }

        if let Err(e) = append_line_synced(&log_path, line) {
            state.needs_rewrite = true;
            return Err(e.into());
        }

        Ok(())
    }

    fn should_compact(&self, state: &FileState) -> bool {
        state.dead_lines >= self.config.compact_threshold && state.dead_lines > state.index.len()
    }

    /// Run a closure against the locked state on the blocking pool
    async fn with_state<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileStore, &mut FileState) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = store.state.lock();
            f(&store, &mut guard)
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }
}

#[async_trait]
impl EventStore for FileStore {
    async fn put(&self, record: EventRecord) -> StoreResult<EventId> {
        self.with_state(move |store, state| {
            let id = record.id;
            let line = LogLine::Put { record: &record }.to_json_line()?;
            store.append(state, &line)?;

            // Only expose the record once its line is durable
            state.index.insert(record);
            Ok(id)
        })
        .await
    }

    async fn enumerate_all(&self) -> StoreResult<Vec<EventRecord>> {
        self.with_state(|_, state| Ok(state.index.snapshot())).await
    }

    async fn delete(&self, ids: &[EventId]) -> StoreResult<usize> {
        let ids = ids.to_vec();
        self.with_state(move |store, state| {
            let present = state.index.present(&ids);
            if present.is_empty() {
                return Ok(0);
            }

            let line = LogLine::Delete { ids: &present }.to_json_line()?;
            store.append(state, &line)?;

            let removed = state.index.remove(&present);
            // Each removed record leaves a dead put line, plus the delete line itself
            state.dead_lines += removed + 1;

            if store.should_compact(state) {
                if let Err(e) = Self::compact(&store.config, state) {
                    // The delete itself is durable; compaction is retried on a later delete
                    warn!(error = %e, "Outbox log compaction failed");
                }
            }

            Ok(removed)
        })
        .await
    }

    async fn len(&self) -> StoreResult<usize> {
        self.with_state(|_, state| Ok(state.index.len())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(FileStoreConfig::new(temp_dir.path())).unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_enumerate() {
        let (store, _temp_dir) = create_test_store();

        let first = EventRecord::new(json!({"event": "app_open"}));
        let second = EventRecord::new(json!({"event": "tap"}));
        let id1 = store.put(first.clone()).await.unwrap();
        let id2 = store.put(second.clone()).await.unwrap();

        assert_eq!(id1, first.id);
        assert_eq!(id2, second.id);

        let all = store.enumerate_all().await.unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[tokio::test]
    async fn test_put_is_written_before_returning() {
        let (store, temp_dir) = create_test_store();

        store.put(EventRecord::new(json!(1))).await.unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("outbox.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"op\":\"put\""));
    }

    #[tokio::test]
    async fn test_delete_exact_ids() {
        let (store, _temp_dir) = create_test_store();

        let a = store.put(EventRecord::new(json!("a"))).await.unwrap();
        let b = store.put(EventRecord::new(json!("b"))).await.unwrap();

        let removed = store.delete(&[a, EventId::new()]).await.unwrap();
        assert_eq!(removed, 1);

        let all = store.enumerate_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, b);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop() {
        let (store, temp_dir) = create_test_store();
        store.put(EventRecord::new(json!(1))).await.unwrap();

        let removed = store.delete(&[EventId::new()]).await.unwrap();
        assert_eq!(removed, 0);

        // No delete line was written
        let content = std::fs::read_to_string(temp_dir.path().join("outbox.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_reopen_replays_log() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStoreConfig::new(temp_dir.path());

        let kept;
        {
            let store = FileStore::open(config.clone()).unwrap();
            let gone = store.put(EventRecord::new(json!("gone"))).await.unwrap();
            kept = store.put(EventRecord::new(json!("kept"))).await.unwrap();
            store.delete(&[gone]).await.unwrap();
        }

        let store = FileStore::open(config).unwrap();
        let all = store.enumerate_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, kept);
        assert_eq!(all[0].payload, json!("kept"));
    }

    #[tokio::test]
    async fn test_torn_trailing_line_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStoreConfig::new(temp_dir.path());

        {
            let store = FileStore::open(config.clone()).unwrap();
            store.put(EventRecord::new(json!("whole"))).await.unwrap();
        }

        // Simulate a crash halfway through the next append
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(config.log_path())
            .unwrap();
        file.write_all(b"{\"op\":\"put\",\"rec").unwrap();
        drop(file);

        let store = FileStore::open(config.clone()).unwrap();
        assert_eq!(store.len().await.unwrap(), 1);

        // New appends land on their own line after the rewrite
        store.put(EventRecord::new(json!("after"))).await.unwrap();
        let reopened = FileStore::open(config).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_partial_line_mid_run_does_not_swallow_next_put() {
        let (store, _temp_dir) = create_test_store();
        let log_path = store.config().log_path();

        let before = store.put(EventRecord::new(json!("before"))).await.unwrap();

        // A failed write left half a line behind while the store stays open
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&log_path)
            .unwrap();
        file.write_all(b"{\"op\":\"put\",\"rec").unwrap();
        drop(file);

        let acked = store.put(EventRecord::new(json!("acknowledged"))).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        let reopened = FileStore::open(store.config().clone()).unwrap();
        let ids: Vec<_> = reopened.enumerate_all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![before, acked]);
    }

    #[tokio::test]
    async fn test_failed_append_is_rolled_back_before_next_put() {
        let (store, _temp_dir) = create_test_store();
        let log_path = store.config().log_path();

        let kept = store.put(EventRecord::new(json!("kept"))).await.unwrap();

        // The bytes of a put reached the file but its sync reported an error,
        // so the caller was told it failed
        let unacked = EventRecord::new(json!("unacked"));
        let line = LogLine::Put { record: &unacked }.to_json_line().unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&log_path)
            .unwrap()
            .write_all(format!("{}\n", line).as_bytes())
            .unwrap();
        store.state.lock().needs_rewrite = true;

        let next = store.put(EventRecord::new(json!("next"))).await.unwrap();
        assert!(!store.state.lock().needs_rewrite);

        let reopened = FileStore::open(store.config().clone()).unwrap();
        let ids: Vec<_> = reopened.enumerate_all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![kept, next]);
    }

    #[tokio::test]
    async fn test_compaction_keeps_live_set() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStoreConfig::new(temp_dir.path()).with_compact_threshold(4);
        let store = FileStore::open(config.clone()).unwrap();

        let survivor = store.put(EventRecord::new(json!("survivor"))).await.unwrap();
        let mut doomed = Vec::new();
        for i in 0..5 {
            doomed.push(store.put(EventRecord::new(json!(i))).await.unwrap());
        }
        store.delete(&doomed).await.unwrap();

        // 6 puts + 1 delete collapse to the single live put
        let content = std::fs::read_to_string(config.log_path()).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(!config.log_path().with_extension("tmp").exists());

        let reopened = FileStore::open(config).unwrap();
        let all = reopened.enumerate_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, survivor);
    }

    #[tokio::test]
    async fn test_leftover_temp_file_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("outbox.tmp"), "partial").unwrap();

        std::fs::write(temp_dir.path().join("notes.tmp"), "someone else's").unwrap();

        let _store = FileStore::open(FileStoreConfig::new(temp_dir.path())).unwrap();
        assert!(!temp_dir.path().join("outbox.tmp").exists());
        assert!(temp_dir.path().join("notes.tmp").exists());
    }
}
