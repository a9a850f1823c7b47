//! Per-block ingestion: Extract → Dedup → Persist → Checkpoint.
//!
//! Blocks are processed under a single lock, so two blocks never overlap and
//! two checkpoint writes never race, even if callers share the pipeline.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointManager, CheckpointStore};
use crate::config::SyncConfig;
use crate::dedup::filter_new;
use crate::error::SyncError;
use crate::extractor::extract;
use crate::persister::BatchPersister;
use crate::store::TransactionStore;
use crate::types::{Block, BlockNumber};

/// Summary of one successfully processed block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub block_number: BlockNumber,
    /// Well-formed transactions in the block.
    pub extracted: usize,
    /// Transactions dropped by the extractor.
    pub malformed: usize,
    /// Transactions filtered out because they were already stored.
    pub already_stored: usize,
    /// Records written.
    pub inserted: usize,
    /// Records skipped on the per-record path as duplicates.
    pub duplicates: usize,
    /// The checkpoint now covers this block (possibly not yet written).
    pub checkpoint_advanced: bool,
    /// The checkpoint store was written for this block.
    pub checkpoint_saved: bool,
}

struct Progress {
    checkpoint: CheckpointManager,
    /// First block that failed in this run; the checkpoint stays below it.
    held_at: Option<BlockNumber>,
}

/// Runs the ingestion steps for one block at a time.
pub struct SyncPipeline {
    transactions: Arc<dyn TransactionStore>,
    persister: BatchPersister,
    progress: Mutex<Progress>,
}

impl SyncPipeline {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: &SyncConfig,
    ) -> Self {
        let checkpoint = CheckpointManager::new(
            checkpoints,
            config.checkpoint_key.clone(),
            config.checkpoint_interval,
        );
        Self {
            transactions,
            persister: BatchPersister::new(config.batch_size),
            progress: Mutex::new(Progress {
                checkpoint,
                held_at: None,
            }),
        }
    }

    /// Load the persisted checkpoint.
    pub async fn load_checkpoint(&self) -> Result<Option<BlockNumber>, SyncError> {
        self.progress.lock().await.checkpoint.load().await
    }

    /// The block the checkpoint is held below, if a block failed this run.
    pub async fn held_at(&self) -> Option<BlockNumber> {
        self.progress.lock().await.held_at
    }

    /// Forget a previous failure (a new run replays from the checkpoint).
    pub async fn clear_hold(&self) {
        self.progress.lock().await.held_at = None;
    }

    /// Write the latest progress to the checkpoint store.
    pub async fn flush_checkpoint(&self) -> Result<Option<BlockNumber>, SyncError> {
        self.progress.lock().await.checkpoint.flush().await
    }

    /// Process one block.
    ///
    /// On success the checkpoint advances to `block.number` unless an earlier
    /// block failed in this run. On failure the checkpoint is left untouched.
    pub async fn process_block(&self, block: &Block) -> Result<BlockReport, SyncError> {
        let mut progress = self.progress.lock().await;

        let mut report = match self.ingest(block).await {
            Ok(report) => report,
            Err(err) => {
                if progress.held_at.is_none() {
                    progress.held_at = Some(block.number);
                }
                return Err(err);
            }
        };

        if let Some(failed) = progress.held_at {
            debug!(block = block.number, failed, "checkpoint held below failed block");
        } else {
            report.checkpoint_saved = progress.checkpoint.maybe_save(block.number).await?;
            report.checkpoint_advanced = true;
        }

        if report.inserted > 0 {
            info!(
                block = block.number,
                inserted = report.inserted,
                existing = report.already_stored,
                "block processed"
            );
        } else {
            debug!(block = block.number, txs = report.extracted, "block processed, nothing new");
        }
        Ok(report)
    }

    async fn ingest(&self, block: &Block) -> Result<BlockReport, SyncError> {
        let extraction = extract(block);
        for err in &extraction.rejected {
            warn!(block = block.number, error = %err, "dropping malformed transaction");
        }

        let mut report = BlockReport {
            block_number: block.number,
            extracted: extraction.records.len(),
            malformed: extraction.rejected.len(),
            ..Default::default()
        };
        if extraction.records.is_empty() {
            return Ok(report);
        }

        let deduped = filter_new(self.transactions.as_ref(), extraction.records).await?;
        report.already_stored = deduped.existing;
        if deduped.fresh.is_empty() {
            return Ok(report);
        }

        let persisted = self
            .persister
            .persist(self.transactions.as_ref(), &deduped.fresh)
            .await;
        report.inserted = persisted.inserted;
        report.duplicates = persisted.duplicates.len();

        if !persisted.is_complete() {
            return Err(SyncError::BlockIncomplete {
                block_number: block.number,
                dropped: persisted.failed.len(),
            });
        }
        Ok(report)
    }
}
