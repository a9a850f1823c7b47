//! The `TransactionStore` trait — durable storage for transaction records.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::TransactionRecord;

/// Append-only storage for [`TransactionRecord`]s, keyed by hash.
///
/// Implementations include `InMemoryStorage` and `SqliteStorage` in
/// `chainsync-storage`.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Return the subset of `hashes` that is already stored. Read-only.
    async fn existing_hashes(&self, hashes: &[String]) -> Result<HashSet<String>, SyncError>;

    /// Insert all `records` in one atomic write.
    ///
    /// On error nothing from the batch may be left stored.
    async fn save_batch(&self, records: &[TransactionRecord]) -> Result<(), SyncError>;

    /// Insert one record. A stored hash yields `SyncError::DuplicateKey`.
    async fn save(&self, record: &TransactionRecord) -> Result<(), SyncError>;
}
