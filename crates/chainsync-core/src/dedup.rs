//! Dedup filter — drops records whose hash is already stored.

use std::collections::HashSet;

use crate::error::SyncError;
use crate::store::TransactionStore;
use crate::types::TransactionRecord;

/// Records that still need to be written, plus what was filtered out.
#[derive(Debug, Default)]
pub struct Deduped {
    /// New records in original block order.
    pub fresh: Vec<TransactionRecord>,
    /// Hashes already present in storage.
    pub existing: usize,
    /// Repeated hashes within the block itself.
    pub repeated: usize,
}

/// Filter `records` against `store` with a single lookup.
///
/// The first occurrence of a hash within the block wins. Storage is not mutated.
pub async fn filter_new(
    store: &dyn TransactionStore,
    records: Vec<TransactionRecord>,
) -> Result<Deduped, SyncError> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    let mut repeated = 0;
    for record in records {
        if seen.insert(record.hash.clone()) {
            unique.push(record);
        } else {
            repeated += 1;
        }
    }

    if unique.is_empty() {
        return Ok(Deduped { repeated, ..Default::default() });
    }

    let candidates: Vec<String> = unique.iter().map(|r| r.hash.clone()).collect();
    let stored = store.existing_hashes(&candidates).await?;

    let fresh: Vec<_> = unique.into_iter().filter(|r| !stored.contains(&r.hash)).collect();
    Ok(Deduped {
        existing: candidates.len() - fresh.len(),
        fresh,
        repeated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Knows a fixed set of hashes and records every lookup.
    struct Known {
        hashes: HashSet<String>,
        lookups: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl TransactionStore for Known {
        async fn existing_hashes(&self, hashes: &[String]) -> Result<HashSet<String>, SyncError> {
            self.lookups.lock().unwrap().push(hashes.to_vec());
            Ok(hashes.iter().filter(|h| self.hashes.contains(*h)).cloned().collect())
        }
        async fn save_batch(&self, _: &[TransactionRecord]) -> Result<(), SyncError> {
            unreachable!("dedup must not write")
        }
        async fn save(&self, _: &TransactionRecord) -> Result<(), SyncError> {
            unreachable!("dedup must not write")
        }
    }

    fn rec(hash: &str) -> TransactionRecord {
        TransactionRecord {
            hash: hash.into(),
            from_address: "0xa".into(),
            to_address: None,
            value: "0".into(),
        }
    }

    fn known(hashes: &[&str]) -> Known {
        Known {
            hashes: hashes.iter().map(|h| h.to_string()).collect(),
            lookups: Mutex::new(vec![]),
        }
    }

    #[tokio::test]
    async fn keeps_order_and_drops_stored() {
        let store = known(&["0x2", "0x4"]);
        let out = filter_new(&store, ["0x1", "0x2", "0x3", "0x4", "0x5"].map(rec).to_vec())
            .await
            .unwrap();

        let hashes: Vec<_> = out.fresh.iter().map(|r| r.hash.as_str()).collect();
        assert_eq!(hashes, ["0x1", "0x3", "0x5"]);
        assert_eq!(out.existing, 2);
        assert_eq!(store.lookups.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_hash_in_block_is_looked_up_once() {
        let store = known(&[]);
        let out = filter_new(&store, ["0x1", "0x2", "0x1"].map(rec).to_vec()).await.unwrap();

        assert_eq!(out.fresh.len(), 2);
        assert_eq!(out.repeated, 1);
        assert_eq!(store.lookups.lock().unwrap()[0], vec!["0x1".to_string(), "0x2".to_string()]);
    }

    #[tokio::test]
    async fn empty_input_skips_lookup() {
        let store = known(&[]);
        let out = filter_new(&store, vec![]).await.unwrap();
        assert!(out.fresh.is_empty());
        assert!(store.lookups.lock().unwrap().is_empty());
    }
}
