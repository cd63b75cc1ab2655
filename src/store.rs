//! Main RecordStore tying collections and the snapshot file together.

use crate::error::Result;
use crate::records::{encode_snapshot, read_snapshot, write_snapshot, Collection};
use crate::types::{collection_defaults, Record, RecordId, RecordInput, StoreStats, ALL, HITS, PAGE};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Path of the JSON snapshot file.
    pub path: PathBuf,

    /// Collections that always exist, even when empty.
    pub default_collections: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/logs.json"),
            default_collections: vec![PAGE.to_string(), ALL.to_string(), HITS.to_string()],
        }
    }
}

impl StoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// In-memory state guarded by the store's lock.
#[derive(Debug)]
struct StoreState {
    collections: BTreeMap<String, Collection>,
    next_id: RecordId,
}

impl StoreState {
    fn empty(config: &StoreConfig) -> Self {
        Self {
            collections: config
                .default_collections
                .iter()
                .map(|name| (name.clone(), Collection::new()))
                .collect(),
            next_id: RecordId(1),
        }
    }
}

/// Named record collections synchronized to a JSON snapshot.
///
/// Every mutation is followed by a full checkpoint of the store to disk.
/// Failed checkpoints are logged and counted; the in-memory state stays
/// authoritative for the rest of the process lifetime.
pub struct RecordStore {
    /// Store configuration.
    config: StoreConfig,

    /// Collections and the global id counter.
    state: RwLock<StoreState>,

    /// Serializes mutations together with their checkpoint so on-disk
    /// generations follow mutation order.
    write_lock: Mutex<()>,

    /// Checkpoints that failed since startup.
    persist_failures: AtomicU64,
}

impl RecordStore {
    /// Load the store from its snapshot.
    ///
    /// A missing snapshot yields empty default collections and is written
    /// out immediately. An unreadable or unparseable snapshot also yields
    /// empty collections, but the file is left untouched until the next
    /// mutation.
    pub fn load(config: StoreConfig) -> Self {
        let (state, write_back) = match read_snapshot(&config.path) {
            Ok(Some(snapshot)) => {
                let mut state = StoreState::empty(&config);
                for (name, collection) in snapshot.collections {
                    state.collections.insert(name, collection);
                }
                state.next_id = snapshot.next_id;

                tracing::info!(
                    path = %config.path.display(),
                    records = state.collections.values().map(Collection::len).sum::<usize>(),
                    next_id = %state.next_id,
                    backfilled = snapshot.backfilled,
                    "Loaded snapshot"
                );
                (state, false)
            }
            Ok(None) => {
                tracing::info!(path = %config.path.display(), "No snapshot found, starting empty");
                (StoreState::empty(&config), true)
            }
            Err(e) => {
                tracing::warn!(
                    path = %config.path.display(),
                    error = %e,
                    "Failed to read snapshot, starting empty"
                );
                (StoreState::empty(&config), false)
            }
        };

        let store = Self {
            config,
            state: RwLock::new(state),
            write_lock: Mutex::new(()),
            persist_failures: AtomicU64::new(0),
        };

        if write_back {
            let _lock = store.write_lock.lock();
            store.checkpoint();
        }

        store
    }

    // --- Mutations ---

    /// Append a record to a collection, creating the collection if needed.
    ///
    /// Missing expected fields are filled with the collection's defaults
    /// and a missing timestamp becomes "now".
    pub fn append(&self, collection: &str, input: RecordInput) -> Record {
        let _lock = self.write_lock.lock();

        let mut fields = input.fields;
        for (name, default) in collection_defaults(collection) {
            fields
                .entry((*name).to_string())
                .or_insert_with(|| (*default).to_string());
        }

        let record = {
            let mut state = self.state.write();
            let id = state.next_id;
            state.next_id = id.next();

            let record = Record {
                id,
                timestamp: input.timestamp.unwrap_or_else(Utc::now),
                client_ip: input.client_ip,
                fields,
            };

            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(record.clone());
            record
        };

        self.checkpoint();
        record
    }

    /// Remove records with the given id from a collection.
    ///
    /// Returns the number removed. Nothing is persisted when it is zero.
    pub fn remove(&self, collection: &str, id: RecordId) -> usize {
        let _lock = self.write_lock.lock();

        let removed = self
            .state
            .write()
            .collections
            .get_mut(collection)
            .map_or(0, |c| c.remove(id));

        if removed > 0 {
            self.checkpoint();
        }
        removed
    }

    /// Empty one collection, or every collection when `collection` is `None`.
    ///
    /// Collection keys are kept. Always persists.
    pub fn clear(&self, collection: Option<&str>) {
        let _lock = self.write_lock.lock();

        {
            let mut state = self.state.write();
            match collection {
                Some(name) => {
                    if let Some(c) = state.collections.get_mut(name) {
                        c.clear();
                    }
                }
                None => state.collections.values_mut().for_each(Collection::clear),
            }
        }

        self.checkpoint();
    }

    // --- Persistence ---

    /// Write the full store to the snapshot path.
    pub fn persist(&self) -> Result<()> {
        let _lock = self.write_lock.lock();
        self.persist_locked()
    }

    /// Write the snapshot. Callers must hold `write_lock`, since every
    /// writer shares the same temp file.
    fn persist_locked(&self) -> Result<()> {
        let started = Instant::now();
        let bytes = encode_snapshot(&self.state.read().collections)?;
        write_snapshot(&self.config.path, &bytes)?;

        tracing::debug!(
            path = %self.config.path.display(),
            bytes = bytes.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Persisted snapshot"
        );
        Ok(())
    }

    /// Persist, logging and counting a failure instead of returning it.
    /// Callers must hold `write_lock`.
    fn checkpoint(&self) {
        if let Err(e) = self.persist_locked() {
            self.persist_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                path = %self.config.path.display(),
                error = %e,
                "Failed to persist snapshot, in-memory state is ahead of disk"
            );
        }
    }

    // --- Reads ---

    /// Records of one collection, most recent first.
    pub fn list(&self, collection: &str) -> Vec<Record> {
        self.state
            .read()
            .collections
            .get(collection)
            .map(Collection::newest_first)
            .unwrap_or_default()
    }

    /// Every collection, each most recent first.
    pub fn list_all(&self) -> BTreeMap<String, Vec<Record>> {
        self.state
            .read()
            .collections
            .iter()
            .map(|(name, c)| (name.clone(), c.newest_first()))
            .collect()
    }

    /// Every collection in storage order, exactly as it is persisted.
    pub fn snapshot(&self) -> BTreeMap<String, Collection> {
        self.state.read().collections.clone()
    }

    /// The id the next appended record will receive.
    pub fn next_id(&self) -> RecordId {
        self.state.read().next_id
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        let collections: BTreeMap<String, usize> = state
            .collections
            .iter()
            .map(|(name, c)| (name.clone(), c.len()))
            .collect();

        StoreStats {
            total_records: collections.values().sum(),
            collections,
            next_id: state.next_id.0,
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            snapshot_path: self.config.path.clone(),
        }
    }

    /// Get the snapshot path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_TAG;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> StoreConfig {
        StoreConfig::at(dir.path().join("data").join("logs.json"))
    }

    #[test]
    fn test_load_creates_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::load(test_config(&dir));

        assert!(store.path().exists());
        assert_eq!(store.next_id(), RecordId(1));

        let snapshot = store.snapshot();
        let names: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(names, vec![ALL, HITS, PAGE]);
        assert!(snapshot.values().all(Collection::is_empty));
    }

    #[test]
    fn test_append_assigns_global_ids() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::load(test_config(&dir));

        let a = store.append(PAGE, RecordInput::new("1.1.1.1"));
        let b = store.append(ALL, RecordInput::new("1.1.1.1"));
        let c = store.append(PAGE, RecordInput::new("1.1.1.1"));

        assert_eq!((a.id, b.id, c.id), (RecordId(1), RecordId(2), RecordId(3)));
        assert_eq!(store.next_id(), RecordId(4));
    }

    #[test]
    fn test_append_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::load(test_config(&dir));

        let record = store.append(PAGE, RecordInput::new("ip").with_field("url", "https://x"));

        assert_eq!(record.field("tag"), Some(DEFAULT_TAG));
        assert_eq!(record.field("url"), Some("https://x"));
        assert_eq!(record.field("cookies"), Some(""));
    }

    #[test]
    fn test_append_creates_collection() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::load(test_config(&dir));

        store.append("custom", RecordInput::new("ip").with_field("k", "v"));

        let records = store.list("custom");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields.len(), 1);
    }

    #[test]
    fn test_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::load(test_config(&dir));

        for value in ["a", "b", "c"] {
            store.append(HITS, RecordInput::new("ip").with_field("value", value));
        }

        let values: Vec<String> = store
            .list(HITS)
            .iter()
            .map(|r| r.field("value").unwrap().to_string())
            .collect();
        assert_eq!(values, vec!["c", "b", "a"]);
        assert!(store.list("missing").is_empty());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::load(test_config(&dir));

        let record = store.append(PAGE, RecordInput::new("ip"));

        assert_eq!(store.remove(ALL, record.id), 0);
        assert_eq!(store.remove(PAGE, record.id), 1);
        assert_eq!(store.remove(PAGE, record.id), 0);
        assert!(store.list(PAGE).is_empty());
    }

    #[test]
    fn test_clear_one_and_all() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::load(test_config(&dir));

        store.append(PAGE, RecordInput::new("ip"));
        store.append(ALL, RecordInput::new("ip"));

        store.clear(Some(PAGE));
        assert!(store.list(PAGE).is_empty());
        assert_eq!(store.list(ALL).len(), 1);

        store.clear(None);
        assert_eq!(store.stats().total_records, 0);
        assert_eq!(store.snapshot().len(), 3);

        // Ids keep growing after a clear.
        let next = store.append(PAGE, RecordInput::new("ip"));
        assert_eq!(next.id, RecordId(3));
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let original = {
            let store = RecordStore::load(config.clone());
            store.append(PAGE, RecordInput::new("10.0.0.1").with_field("url", "https://x"));
            store.append(ALL, RecordInput::new("10.0.0.2").with_field("host", "example.org"));
            store.snapshot()
        };

        let store = RecordStore::load(config);
        assert_eq!(store.snapshot(), original);
        assert_eq!(store.next_id(), RecordId(3));
    }

    #[test]
    fn test_persist_concurrent_with_appends() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(RecordStore::load(test_config(&dir)));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    store.append(PAGE, RecordInput::new("ip"));
                }
            })
        };
        for _ in 0..50 {
            store.persist().unwrap();
        }
        writer.join().unwrap();

        assert_eq!(store.stats().persist_failures, 0);
        let reloaded = RecordStore::load(test_config(&dir));
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::load(test_config(&dir));

        store.append(PAGE, RecordInput::new("ip"));
        store.append(PAGE, RecordInput::new("ip"));

        let stats = store.stats();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.collections[PAGE], 2);
        assert_eq!(stats.collections[ALL], 0);
        assert_eq!(stats.next_id, 3);
        assert_eq!(stats.persist_failures, 0);
    }
}
