//! In-memory storage backend.
//!
//! Stores transaction records and checkpoints in RAM and counts every storage
//! call, which makes it the backend of choice for pipeline tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chainsync_core::checkpoint::{Checkpoint, CheckpointStore};
use chainsync_core::error::SyncError;
use chainsync_core::store::TransactionStore;
use chainsync_core::types::TransactionRecord;

/// Counters of calls made against an [`InMemoryStorage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// `existing_hashes` calls.
    pub lookups: usize,
    /// `save_batch` calls, successful or not.
    pub batch_writes: usize,
    /// `save` calls, successful or not.
    pub row_writes: usize,
    /// Records actually inserted.
    pub records_written: usize,
}

/// In-memory storage for transactions and checkpoints.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStorage {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
    transactions: Mutex<HashMap<String, TransactionRecord>>,
    stats: Mutex<StorageStats>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with `records` without touching the counters.
    pub fn with_transactions(records: impl IntoIterator<Item = TransactionRecord>) -> Self {
        let store = Self::new();
        {
            let mut txs = store.transactions.lock().unwrap();
            for r in records {
                txs.insert(r.hash.clone(), r);
            }
        }
        store
    }

    /// Look up a stored transaction by hash.
    pub fn transaction(&self, hash: &str) -> Option<TransactionRecord> {
        self.transactions.lock().unwrap().get(hash).cloned()
    }

    /// All stored hashes.
    pub fn hashes(&self) -> HashSet<String> {
        self.transactions.lock().unwrap().keys().cloned().collect()
    }

    /// Total number of stored transactions.
    pub fn transaction_count(&self) -> usize {
        self.transactions.lock().unwrap().len()
    }

    pub fn stats(&self) -> StorageStats {
        *self.stats.lock().unwrap()
    }
}

#[async_trait]
impl TransactionStore for InMemoryStorage {
    async fn existing_hashes(&self, hashes: &[String]) -> Result<HashSet<String>, SyncError> {
        self.stats.lock().unwrap().lookups += 1;
        let txs = self.transactions.lock().unwrap();
        Ok(hashes.iter().filter(|h| txs.contains_key(*h)).cloned().collect())
    }

    async fn save_batch(&self, records: &[TransactionRecord]) -> Result<(), SyncError> {
        self.stats.lock().unwrap().batch_writes += 1;
        let mut txs = self.transactions.lock().unwrap();

        // All-or-nothing: validate the whole batch before inserting anything.
        let mut batch = HashSet::with_capacity(records.len());
        for r in records {
            if txs.contains_key(&r.hash) || !batch.insert(r.hash.as_str()) {
                return Err(SyncError::DuplicateKey { hash: r.hash.clone() });
            }
        }
        for r in records {
            txs.insert(r.hash.clone(), r.clone());
        }
        self.stats.lock().unwrap().records_written += records.len();
        Ok(())
    }

    async fn save(&self, record: &TransactionRecord) -> Result<(), SyncError> {
        self.stats.lock().unwrap().row_writes += 1;
        let mut txs = self.transactions.lock().unwrap();
        if txs.contains_key(&record.hash) {
            return Err(SyncError::DuplicateKey { hash: record.hash.clone() });
        }
        txs.insert(record.hash.clone(), record.clone());
        self.stats.lock().unwrap().records_written += 1;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Checkpoint>, SyncError> {
        Ok(self.checkpoints.lock().unwrap().get(key).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), SyncError> {
        self.checkpoints.lock().unwrap().insert(checkpoint.key.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SyncError> {
        self.checkpoints.lock().unwrap().remove(key);
        Ok(())
    }
}
