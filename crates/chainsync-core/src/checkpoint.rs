//! Checkpoint manager — persists the sync position for crash recovery.
//!
//! A checkpoint is a single named entry holding the highest block number
//! whose transactions are fully stored. On restart the controller resumes
//! from `checkpoint + 1` instead of re-ingesting from scratch.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::BlockNumber;

/// Key used when none is configured.
pub const DEFAULT_CHECKPOINT_KEY: &str = "transactions";

/// A persisted checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Fixed identity of the checkpoint entry.
    pub key: String,
    /// Last fully persisted block number.
    pub block_number: BlockNumber,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

/// Trait for storing and loading checkpoints.
///
/// `save` is an upsert by key: there is only ever one entry per key.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<Checkpoint>, SyncError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), SyncError>;

    /// Delete a checkpoint (operator reset).
    async fn delete(&self, key: &str) -> Result<(), SyncError>;
}

/// Binds a [`CheckpointStore`] to a single key and batches writes.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    key: String,
    /// How often to save (every N advanced blocks).
    save_interval: u64,
    /// Blocks advanced since the last write.
    counter: u64,
    /// Highest advanced block not yet written.
    pending: Option<BlockNumber>,
    /// Last value written by this manager.
    last_saved: Option<BlockNumber>,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, key: impl Into<String>, save_interval: u64) -> Self {
        Self {
            store,
            key: key.into(),
            save_interval: save_interval.max(1),
            counter: 0,
            pending: None,
            last_saved: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the saved block number (`None` if no checkpoint exists yet).
    pub async fn load(&self) -> Result<Option<BlockNumber>, SyncError> {
        Ok(self.store.load(&self.key).await?.map(|cp| cp.block_number))
    }

    /// Record that `block_number` is fully processed; write every `save_interval` calls.
    ///
    /// Returns `true` if the store was written.
    pub async fn maybe_save(&mut self, block_number: BlockNumber) -> Result<bool, SyncError> {
        self.pending = Some(block_number);
        self.counter += 1;
        if self.counter < self.save_interval {
            return Ok(false);
        }
        self.force_save(block_number).await?;
        Ok(true)
    }

    /// Immediately save `block_number`.
    pub async fn force_save(&mut self, block_number: BlockNumber) -> Result<(), SyncError> {
        let cp = Checkpoint {
            key: self.key.clone(),
            block_number,
            updated_at: chrono::Utc::now().timestamp(),
        };
        self.store.save(cp).await?;
        self.counter = 0;
        self.pending = None;
        self.last_saved = Some(block_number);
        Ok(())
    }

    /// Write the most recent progress, pending or already saved (used on shutdown).
    pub async fn flush(&mut self) -> Result<Option<BlockNumber>, SyncError> {
        let Some(block_number) = self.pending.or(self.last_saved) else {
            return Ok(None);
        };
        self.force_save(block_number).await?;
        Ok(Some(block_number))
    }

    /// Progress recorded but not yet written.
    pub fn pending(&self) -> Option<BlockNumber> {
        self.pending
    }

    /// Remove the checkpoint entirely.
    pub async fn reset(&mut self) -> Result<(), SyncError> {
        self.store.delete(&self.key).await?;
        self.counter = 0;
        self.pending = None;
        self.last_saved = None;
        Ok(())
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory checkpoint store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<Checkpoint>, SyncError> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), SyncError> {
        self.data.lock().unwrap().insert(checkpoint.key.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SyncError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(interval: u64) -> (Arc<MemoryCheckpointStore>, CheckpointManager) {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mgr = CheckpointManager::new(store.clone(), DEFAULT_CHECKPOINT_KEY, interval);
        (store, mgr)
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let (store, mut mgr) = manager(1);

        assert!(mgr.load().await.unwrap().is_none());

        mgr.force_save(1000).await.unwrap();
        assert_eq!(mgr.load().await.unwrap(), Some(1000));

        let cp = store.load(DEFAULT_CHECKPOINT_KEY).await.unwrap().unwrap();
        assert_eq!(cp.key, "transactions");
    }

    #[tokio::test]
    async fn save_overwrites_in_place() {
        let (_, mut mgr) = manager(1);
        mgr.force_save(200).await.unwrap();
        // Lower values are legal (re-processing after restart).
        mgr.force_save(150).await.unwrap();
        assert_eq!(mgr.load().await.unwrap(), Some(150));
    }

    #[tokio::test]
    async fn every_block_with_default_interval() {
        let (_, mut mgr) = manager(1);
        for n in 10..=12 {
            assert!(mgr.maybe_save(n).await.unwrap());
        }
        assert_eq!(mgr.load().await.unwrap(), Some(12));
        assert!(mgr.pending().is_none());
    }

    #[tokio::test]
    async fn checkpoint_save_interval() {
        let (_, mut mgr) = manager(5);

        for n in 1..=4 {
            assert!(!mgr.maybe_save(n).await.unwrap());
        }
        assert!(mgr.load().await.unwrap().is_none());
        assert_eq!(mgr.pending(), Some(4));

        assert!(mgr.maybe_save(5).await.unwrap());
        assert_eq!(mgr.load().await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn flush_writes_pending_progress() {
        let (_, mut mgr) = manager(10);
        assert_eq!(mgr.flush().await.unwrap(), None);

        mgr.maybe_save(41).await.unwrap();
        mgr.maybe_save(42).await.unwrap();
        assert_eq!(mgr.flush().await.unwrap(), Some(42));
        assert_eq!(mgr.load().await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn reset_deletes_checkpoint() {
        let (_, mut mgr) = manager(1);
        mgr.force_save(7).await.unwrap();
        mgr.reset().await.unwrap();
        assert!(mgr.load().await.unwrap().is_none());
        assert_eq!(mgr.flush().await.unwrap(), None);
    }
}
