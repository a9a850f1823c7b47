//! Batch persister — bulk writes with per-record fallback.
//!
//! Records are written in fixed-size batches. If a bulk write fails (a
//! duplicate slipped in through a concurrent writer, or any other constraint
//! violation), that batch is retried one record at a time and each record's
//! outcome is collected into a [`PersistReport`].

use tracing::{debug, warn};

use crate::error::SyncError;
use crate::store::TransactionStore;
use crate::types::TransactionRecord;

/// Default number of records per bulk write.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// What happened to a single record on the per-record path.
#[derive(Debug)]
pub enum RecordOutcome {
    Inserted,
    Duplicate,
    Failed(SyncError),
}

impl RecordOutcome {
    fn classify(result: Result<(), SyncError>) -> Self {
        match result {
            Ok(()) => Self::Inserted,
            Err(e) if e.is_duplicate() => Self::Duplicate,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Aggregated outcome of persisting one block's new records.
#[derive(Debug, Default)]
pub struct PersistReport {
    /// Records written.
    pub inserted: usize,
    /// Hashes skipped because they were already stored.
    pub duplicates: Vec<String>,
    /// Records dropped for any other reason.
    pub failed: Vec<(String, SyncError)>,
    /// Bulk writes attempted.
    pub batches: usize,
    /// Batches that fell back to per-record writes.
    pub fallbacks: usize,
}

impl PersistReport {
    /// `true` if no record was dropped.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes records in bounded batches.
#[derive(Debug, Clone)]
pub struct BatchPersister {
    batch_size: usize,
}

impl Default for BatchPersister {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchPersister {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Persist `records` in order. Never fails as a whole.
    pub async fn persist(
        &self,
        store: &dyn TransactionStore,
        records: &[TransactionRecord],
    ) -> PersistReport {
        let mut report = PersistReport::default();

        for batch in records.chunks(self.batch_size) {
            report.batches += 1;
            match store.save_batch(batch).await {
                Ok(()) => report.inserted += batch.len(),
                Err(err) => {
                    report.fallbacks += 1;
                    debug!(
                        size = batch.len(),
                        error = %err,
                        "batch write failed, retrying record by record"
                    );
                    self.persist_each(store, batch, &mut report).await;
                }
            }
        }

        report
    }

    async fn persist_each(
        &self,
        store: &dyn TransactionStore,
        batch: &[TransactionRecord],
        report: &mut PersistReport,
    ) {
        for record in batch {
            match RecordOutcome::classify(store.save(record).await) {
                RecordOutcome::Inserted => report.inserted += 1,
                RecordOutcome::Duplicate => {
                    debug!(hash = %record.hash, "transaction already stored, skipping");
                    report.duplicates.push(record.hash.clone());
                }
                RecordOutcome::Failed(err) => {
                    warn!(hash = %record.hash, error = %err, "dropping transaction");
                    report.failed.push((record.hash.clone(), err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Map-backed store that can reject chosen hashes.
    #[derive(Default)]
    struct Scripted {
        rows: Mutex<HashMap<String, TransactionRecord>>,
        /// Already stored but invisible to lookups (a concurrent writer).
        hidden: HashSet<String>,
        /// Rejected with a non-duplicate error.
        poisoned: HashSet<String>,
        bulk_calls: Mutex<usize>,
    }

    impl Scripted {
        fn check(&self, r: &TransactionRecord) -> Result<(), SyncError> {
            if self.hidden.contains(&r.hash) || self.rows.lock().unwrap().contains_key(&r.hash) {
                return Err(SyncError::DuplicateKey { hash: r.hash.clone() });
            }
            if self.poisoned.contains(&r.hash) {
                return Err(SyncError::Storage(format!("constraint failed: {}", r.hash)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TransactionStore for Scripted {
        async fn existing_hashes(&self, _: &[String]) -> Result<HashSet<String>, SyncError> {
            Ok(HashSet::new())
        }

        async fn save_batch(&self, records: &[TransactionRecord]) -> Result<(), SyncError> {
            *self.bulk_calls.lock().unwrap() += 1;
            for r in records {
                self.check(r)?;
            }
            let mut rows = self.rows.lock().unwrap();
            for r in records {
                rows.insert(r.hash.clone(), r.clone());
            }
            Ok(())
        }

        async fn save(&self, record: &TransactionRecord) -> Result<(), SyncError> {
            self.check(record)?;
            self.rows.lock().unwrap().insert(record.hash.clone(), record.clone());
            Ok(())
        }
    }

    fn records(n: usize) -> Vec<TransactionRecord> {
        (0..n)
            .map(|i| TransactionRecord {
                hash: format!("0x{i:04x}"),
                from_address: "0xsender".into(),
                to_address: Some("0xrecipient".into()),
                value: i.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn splits_into_bounded_batches() {
        let store = Scripted::default();
        let report = BatchPersister::default().persist(&store, &records(250)).await;

        assert_eq!(report.batches, 3);
        assert_eq!(report.inserted, 250);
        assert_eq!(report.fallbacks, 0);
        assert_eq!(*store.bulk_calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn duplicate_in_batch_is_skipped() {
        let recs = records(100);
        let store = Scripted {
            hidden: [recs[57].hash.clone()].into(),
            ..Default::default()
        };
        let report = BatchPersister::default().persist(&store, &recs).await;

        assert_eq!(report.inserted, 99);
        assert_eq!(report.duplicates, vec![recs[57].hash.clone()]);
        assert!(report.is_complete());
        assert_eq!(report.fallbacks, 1);
        assert_eq!(store.rows.lock().unwrap().len(), 99);
    }

    #[tokio::test]
    async fn other_failure_drops_only_that_record() {
        let recs = records(150);
        let store = Scripted {
            poisoned: [recs[3].hash.clone()].into(),
            ..Default::default()
        };
        let report = BatchPersister::new(100).persist(&store, &recs).await;

        // First batch falls back, second batch goes through in bulk.
        assert_eq!(report.fallbacks, 1);
        assert_eq!(report.inserted, 149);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, recs[3].hash);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        assert_eq!(BatchPersister::new(0).batch_size(), 1);
    }
}
