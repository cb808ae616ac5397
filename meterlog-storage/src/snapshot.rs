//! Snapshot storage.
//!
//! Each key (one per log instance) maps to its latest snapshot file. The
//! index lives in `index.json` next to the `.snap` files and records the
//! crc32c checksum of every payload.

use crate::error::StorageError;
use meterlog_core::LogInstance;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Persisted form of one log instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub snapshot_id: String,
    pub key: String,
    /// Creation timestamp (Unix millis).
    pub created_at: i64,
    pub instance: LogInstance,
}

/// Snapshot metadata stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub snapshot_id: String,
    pub key: String,
    pub created_at: i64,
    pub entry_count: usize,
    pub size_bytes: u64,
    pub checksum: String,
}

/// Snapshot store for persisting log instances.
pub struct SnapshotStore {
    dir: PathBuf,
    /// Latest snapshot per key.
    index: RwLock<HashMap<String, SnapshotMeta>>,
}

impl SnapshotStore {
    /// Opens or creates a snapshot store at the given directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let store = Self {
            dir,
            index: RwLock::new(HashMap::new()),
        };
        store.load_index()?;

        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_index(&self) -> Result<(), StorageError> {
        let index_path = self.dir.join("index.json");
        if !index_path.exists() {
            return Ok(());
        }

        let file = File::open(&index_path)?;
        let reader = BufReader::new(file);
        let index: HashMap<String, SnapshotMeta> = serde_json::from_reader(reader)?;
        *self.index.write() = index;

        Ok(())
    }

    fn save_index(&self) -> Result<(), StorageError> {
        let index_path = self.dir.join("index.json");
        let file = File::create(&index_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &*self.index.read())?;
        Ok(())
    }

    /// Persists `instance` as the latest snapshot for `key`.
    ///
    /// The previous snapshot file for the key is removed once the index
    /// points at the new one.
    pub fn save(&self, key: &str, instance: &LogInstance) -> Result<SnapshotMeta, StorageError> {
        let snapshot = LogSnapshot {
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            key: key.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            instance: instance.clone(),
        };

        let data = serde_json::to_vec_pretty(&snapshot)?;
        let checksum = format!("{:08x}", crc32c::crc32c(&data));

        let snapshot_path = self.snapshot_path(&snapshot.snapshot_id);
        let mut file = File::create(&snapshot_path)?;
        file.write_all(&data)?;
        file.sync_all()?;

        let meta = SnapshotMeta {
            snapshot_id: snapshot.snapshot_id.clone(),
            key: key.to_string(),
            created_at: snapshot.created_at,
            entry_count: instance.count(),
            size_bytes: data.len() as u64,
            checksum,
        };

        let previous = self.index.write().insert(key.to_string(), meta.clone());
        self.save_index()?;

        if let Some(previous) = previous {
            let old_path = self.snapshot_path(&previous.snapshot_id);
            if old_path.exists() {
                fs::remove_file(&old_path)?;
            }
        }

        tracing::info!(
            "Saved snapshot {} for log {} ({} entries)",
            meta.snapshot_id,
            key,
            meta.entry_count
        );

        Ok(meta)
    }

    /// Loads a snapshot by ID, verifying its checksum against the index.
    pub fn load_snapshot(&self, snapshot_id: &str) -> Result<LogSnapshot, StorageError> {
        let snapshot_path = self.snapshot_path(snapshot_id);
        if !snapshot_path.exists() {
            return Err(StorageError::SnapshotNotFound(snapshot_id.to_string()));
        }

        let mut file = File::open(&snapshot_path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let expected = {
            let index = self.index.read();
            index
                .values()
                .find(|m| m.snapshot_id == snapshot_id)
                .map(|m| m.checksum.clone())
        };
        if let Some(expected) = expected {
            let actual = format!("{:08x}", crc32c::crc32c(&data));
            if actual != expected {
                tracing::warn!("Snapshot {} failed checksum verification", snapshot_id);
                return Err(StorageError::Corruption(format!(
                    "snapshot {} checksum mismatch",
                    snapshot_id
                )));
            }
        }

        let snapshot: LogSnapshot = serde_json::from_slice(&data).map_err(|e| {
            tracing::warn!("Snapshot {} holds an invalid log: {}", snapshot_id, e);
            StorageError::Corruption(format!("snapshot {} rejected: {}", snapshot_id, e))
        })?;
        Ok(snapshot)
    }

    /// Loads the latest persisted instance for `key`.
    pub fn load(&self, key: &str) -> Result<Option<LogInstance>, StorageError> {
        let snapshot_id = self.index.read().get(key).map(|m| m.snapshot_id.clone());

        match snapshot_id {
            Some(sid) => Ok(Some(self.load_snapshot(&sid)?.instance)),
            None => Ok(None),
        }
    }

    /// Removes the snapshot for `key`, if any.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.index.write().remove(key);
        if let Some(meta) = removed {
            let path = self.snapshot_path(&meta.snapshot_id);
            if path.exists() {
                fs::remove_file(&path)?;
            }
            self.save_index()?;
            tracing::info!("Removed snapshot {} for log {}", meta.snapshot_id, key);
        }
        Ok(())
    }

    pub fn meta(&self, key: &str) -> Option<SnapshotMeta> {
        self.index.read().get(key).cloned()
    }

    pub fn list(&self) -> Vec<SnapshotMeta> {
        self.index.read().values().cloned().collect()
    }

    pub fn snapshot_count(&self) -> usize {
        self.index.read().len()
    }

    fn snapshot_path(&self, snapshot_id: &str) -> PathBuf {
        self.dir.join(format!("{}.snap", snapshot_id))
    }
}
