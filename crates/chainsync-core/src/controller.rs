//! Sync controller — owns the subscription and the processing task.
//!
//! # Lifecycle
//! `Stopped → Starting → Running → Stopping → Stopped`
//!
//! - **Starting**: load the checkpoint; resume at `checkpoint + 1`, or at the
//!   chain head when no checkpoint exists. Any failure here is fatal.
//! - **Running**: a spawned task pulls one block at a time from the
//!   subscription and hands it to the [`SyncPipeline`].
//! - **Stopping**: unsubscribe, let the in-flight block finish, then flush
//!   the checkpoint.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::{FailurePolicy, SyncConfig, SyncState};
use crate::error::{ErrorClass, SyncError};
use crate::pipeline::{BlockReport, SyncPipeline};
use crate::source::{BlockSource, BlockSubscription};
use crate::store::TransactionStore;
use crate::types::{Block, BlockNumber};

/// Whether the processing loop keeps going after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Proceed,
    Stop,
}

/// The controller's single skip-vs-abort decision point.
pub fn on_error(class: ErrorClass, policy: FailurePolicy) -> Flow {
    match class {
        ErrorClass::DuplicateKey | ErrorClass::Extraction => Flow::Proceed,
        ErrorClass::Persistence => match policy {
            FailurePolicy::Continue => Flow::Proceed,
            FailurePolicy::Halt => Flow::Stop,
        },
        ErrorClass::TransientFetch | ErrorClass::FatalStartup => Flow::Stop,
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives a [`BlockSource`] subscription through a [`SyncPipeline`].
pub struct SyncController {
    source: Arc<dyn BlockSource>,
    pipeline: Arc<SyncPipeline>,
    config: SyncConfig,
    state: Arc<watch::Sender<SyncState>>,
    worker: Option<Worker>,
}

impl SyncController {
    pub fn new(
        source: Arc<dyn BlockSource>,
        transactions: Arc<dyn TransactionStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: SyncConfig,
    ) -> Self {
        let pipeline = Arc::new(SyncPipeline::new(transactions, checkpoints, &config));
        let (state, _) = watch::channel(SyncState::Stopped);
        Self {
            source,
            pipeline,
            config,
            state: Arc::new(state),
            worker: None,
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<SyncPipeline> {
        &self.pipeline
    }

    /// Process a single block without a subscription.
    pub async fn process_block(&self, block: &Block) -> Result<BlockReport, SyncError> {
        self.pipeline.process_block(block).await
    }

    /// Load the checkpoint, subscribe, and start consuming blocks.
    ///
    /// Does nothing if already running. Returns `SyncError::Startup` if no
    /// starting block can be determined.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        if let Some(worker) = &self.worker {
            if !worker.handle.is_finished() {
                debug!("sync already running");
                return Ok(());
            }
        }
        // Reap a task that ended on its own (subscription error or halt).
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.handle.await {
                error!(error = %e, "previous sync task panicked");
            }
        }

        self.state.send_replace(SyncState::Starting);
        self.pipeline.clear_hold().await;

        let subscription = match self.open_subscription().await {
            Ok(sub) => sub,
            Err(err) => {
                error!(error = %err, "sync startup failed");
                self.state.send_replace(SyncState::Stopped);
                return Err(err);
            }
        };

        let cancel = CancellationToken::new();
        self.state.send_replace(SyncState::Running);
        let handle = tokio::spawn(run(
            Arc::clone(&self.pipeline),
            subscription,
            cancel.clone(),
            Arc::clone(&self.state),
            self.config.clone(),
        ));
        self.worker = Some(Worker { cancel, handle });
        Ok(())
    }

    /// Unsubscribe and wait for the in-flight block. Does nothing if stopped.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            debug!("sync already stopped");
            return;
        };
        if !worker.handle.is_finished() {
            self.state.send_replace(SyncState::Stopping);
        }
        worker.cancel.cancel();
        if let Err(e) = worker.handle.await {
            error!(error = %e, "sync task panicked");
        }
        self.state.send_replace(SyncState::Stopped);
    }

    /// Resolve once the controller reaches `Stopped`.
    pub async fn wait_stopped(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so this can only end by matching.
        let _ = rx.wait_for(|s| *s == SyncState::Stopped).await;
    }

    async fn open_subscription(&self) -> Result<BlockSubscription, SyncError> {
        let checkpoint = self
            .pipeline
            .load_checkpoint()
            .await
            .map_err(|e| SyncError::Startup(format!("loading checkpoint: {e}")))?;

        let start: BlockNumber = match checkpoint {
            Some(n) => {
                info!(checkpoint = n, "resuming from checkpoint");
                n.checked_add(1).ok_or_else(|| {
                    SyncError::Startup(format!("checkpoint {n} leaves no block to resume at"))
                })?
            }
            None => {
                let head = self.source.head_block_number().await.map_err(|e| {
                    SyncError::Startup(format!("no checkpoint and chain head unavailable: {e}"))
                })?;
                info!(head, "no checkpoint, starting at chain head");
                head
            }
        };

        self.source
            .subscribe(start)
            .await
            .map_err(|e| SyncError::Startup(format!("subscribing from block {start}: {e}")))
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.cancel.cancel();
        }
    }
}

async fn run(
    pipeline: Arc<SyncPipeline>,
    mut subscription: BlockSubscription,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SyncState>>,
    config: SyncConfig,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = subscription.next() => item,
        };

        match item {
            Some(Ok(block)) => {
                let number = block.number;
                if let Err(err) = pipeline.process_block(&block).await {
                    warn!(block = number, error = %err, "block failed, checkpoint not advanced");
                    if on_error(err.class(), config.failure_policy) == Flow::Stop {
                        error!(block = number, "stopping sync after block failure");
                        break;
                    }
                }
            }
            Some(Err(err)) => {
                error!(error = %err, "block subscription failed");
                if on_error(err.class(), config.failure_policy) == Flow::Stop {
                    break;
                }
            }
            None => {
                warn!("block subscription ended");
                break;
            }
        }
    }

    state.send_replace(SyncState::Stopping);
    subscription.unsubscribe().await;

    if config.save_checkpoint_on_stop {
        match pipeline.flush_checkpoint().await {
            Ok(Some(n)) => info!(checkpoint = n, "final checkpoint saved"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to save final checkpoint"),
        }
    }

    state.send_replace(SyncState::Stopped);
    info!("sync stopped");
}
