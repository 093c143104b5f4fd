//! Durable storage for the weight table
//!
//! The engine only talks to a [`WeightStore`]. Writes go through a
//! [`PersistenceWorker`] running on its own thread, so a slow disk never
//! delays a scoring call.

use crate::error::StoreError;
use crate::features::Feature;
use crate::scoring::WeightTable;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Current on-disk snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Load/save interface for weight snapshots
pub trait WeightStore: Send + Sync {
    /// Most recently saved table, or `None` if nothing was saved yet
    fn load(&self) -> Result<Option<WeightTable>, StoreError>;

    fn save(&self, weights: &WeightTable) -> Result<(), StoreError>;
}

/// Serialized form of a weight table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub max_weight: f64,
    pub weights: BTreeMap<Feature, f64>,
}

impl WeightSnapshot {
    pub fn capture(weights: &WeightTable) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            max_weight: weights.max_weight(),
            weights: weights.as_map().clone(),
        }
    }

    /// Check the snapshot and rebuild the table it describes
    pub fn restore(&self) -> Result<WeightTable, StoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StoreError::CorruptSnapshot(format!(
                "unsupported version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        if !self.max_weight.is_finite() || self.max_weight <= 0.0 {
            return Err(StoreError::CorruptSnapshot(format!(
                "invalid max_weight {}",
                self.max_weight
            )));
        }
        if let Some(missing) = Feature::ALL
            .iter()
            .find(|feature| !self.weights.contains_key(*feature))
        {
            return Err(StoreError::CorruptSnapshot(format!(
                "no weight for {}",
                missing
            )));
        }
        for (feature, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 || *weight > self.max_weight {
                return Err(StoreError::CorruptSnapshot(format!(
                    "weight for {} out of range: {}",
                    feature, weight
                )));
            }
        }
        Ok(WeightTable::new(&self.weights, self.max_weight))
    }
}

/// Stores the weight snapshot as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WeightStore for JsonFileStore {
    fn load(&self) -> Result<Option<WeightTable>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path)?;
        let snapshot: WeightSnapshot = serde_json::from_slice(&data)?;
        snapshot.restore().map(Some)
    }

    fn save(&self, weights: &WeightTable) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write beside the target, then rename over it
        let json = serde_json::to_vec_pretty(&WeightSnapshot::capture(weights))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<WeightSnapshot>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a table
    pub fn with_weights(weights: &WeightTable) -> Self {
        Self {
            snapshot: Mutex::new(Some(WeightSnapshot::capture(weights))),
            saves: Mutex::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl WeightStore for MemoryStore {
    fn load(&self) -> Result<Option<WeightTable>, StoreError> {
        match self.snapshot.lock().as_ref() {
            Some(snapshot) => snapshot.restore().map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, weights: &WeightTable) -> Result<(), StoreError> {
        *self.snapshot.lock() = Some(WeightSnapshot::capture(weights));
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Background writer feeding a [`WeightStore`]
pub struct PersistenceWorker {
    sender: Option<Sender<Arc<WeightTable>>>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    pub fn spawn(store: Arc<dyn WeightStore>) -> Self {
        let (sender, receiver) = mpsc::channel::<Arc<WeightTable>>();

        let handle = thread::Builder::new()
            .name("weight-persistence".to_string())
            .spawn(move || {
                while let Ok(mut weights) = receiver.recv() {
                    // Only the newest queued table matters
                    while let Ok(newer) = receiver.try_recv() {
                        weights = newer;
                    }
                    match store.save(&weights) {
                        Ok(()) => log::debug!("Persisted weight table"),
                        Err(e) => log::warn!("Failed to persist weight table: {}", e),
                    }
                }
            });

        match handle {
            Ok(handle) => Self {
                sender: Some(sender),
                handle: Some(handle),
            },
            Err(e) => {
                log::warn!("Could not start persistence thread, weights will not be saved: {}", e);
                Self {
                    sender: None,
                    handle: None,
                }
            }
        }
    }

    /// Queue a table for saving; never blocks on I/O
    pub fn enqueue(&self, weights: Arc<WeightTable>) {
        if let Some(sender) = &self.sender {
            if sender.send(weights).is_err() {
                log::warn!("Persistence thread has stopped, dropping weight snapshot");
            }
        }
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain its queue and exit
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Persistence thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for PersistenceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceWorker")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn default_table() -> WeightTable {
        WeightTable::from_config(&EngineConfig::default())
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("weights.json"));
        assert!(store.load().unwrap().is_none());

        let table = default_table().bumped([Feature::OffHours], 3.0);
        store.save(&table).unwrap();

        assert_eq!(store.load().unwrap(), Some(table));
    }

    #[test]
    fn test_json_store_rejects_out_of_range_weight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let mut snapshot = WeightSnapshot::capture(&default_table());
        snapshot.weights.insert(Feature::DeviceNovelty, 9000.0);
        fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        let result = JsonFileStore::new(&path).load();
        assert!(matches!(result, Err(StoreError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_json_store_rejects_missing_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        fs::write(
            &path,
            r#"{"version":1,"saved_at":"2024-01-15T00:00:00Z","max_weight":50.0,"weights":{}}"#,
        )
        .unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(StoreError::CorruptSnapshot(_))
        ));

        let mut snapshot = WeightSnapshot::capture(&default_table());
        snapshot.weights.remove(&Feature::AmountDeviation);
        assert!(matches!(
            snapshot.restore(),
            Err(StoreError::CorruptSnapshot(msg)) if msg.contains("amount_deviation")
        ));
    }

    #[test]
    fn test_snapshot_version_checked() {
        let mut snapshot = WeightSnapshot::capture(&default_table());
        snapshot.version = 99;
        assert!(snapshot.restore().is_err());
    }

    #[test]
    fn test_worker_saves_latest_on_drop() {
        let store = Arc::new(MemoryStore::new());
        let worker = PersistenceWorker::spawn(store.clone());

        let mut table = default_table();
        for _ in 0..5 {
            table = table.bumped([Feature::TypingAnomaly], 1.0);
            worker.enqueue(Arc::new(table.clone()));
        }
        drop(worker);

        assert!(store.save_count() >= 1);
        assert_eq!(store.load().unwrap(), Some(table));
    }
}
