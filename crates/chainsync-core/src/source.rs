//! Block source abstraction and the subscription handle it returns.
//!
//! A source runs a producer task that pushes blocks into a bounded channel;
//! the consumer pulls them one at a time through [`BlockSubscription`], which
//! implements [`futures::Stream`]. Cancellation is a [`CancellationToken`]
//! shared by both ends.

use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::types::{Block, BlockNumber};

/// Item delivered by a subscription. An `Err` is terminal.
pub type BlockItem = Result<Block, SyncError>;

/// Supplies blocks in strictly increasing order.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// The chain's current head block number.
    async fn head_block_number(&self) -> Result<BlockNumber, SyncError>;

    /// Replay blocks from `start` (inclusive), then follow new blocks forever.
    async fn subscribe(&self, start: BlockNumber) -> Result<BlockSubscription, SyncError>;
}

// ─── Producer side ────────────────────────────────────────────────────────────

/// Producer half of a subscription.
#[derive(Clone)]
pub struct BlockSender {
    tx: mpsc::Sender<BlockItem>,
    cancel: CancellationToken,
}

impl BlockSender {
    /// Deliver one item, waiting for channel capacity.
    ///
    /// Returns `false` once the subscriber has unsubscribed or gone away.
    pub async fn send(&self, item: BlockItem) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            res = self.tx.send(item) => res.is_ok(),
        }
    }

    /// Resolves when the subscriber unsubscribes.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

// ─── Consumer side ────────────────────────────────────────────────────────────

/// An open block subscription.
///
/// Dropping the handle cancels the producer.
pub struct BlockSubscription {
    rx: mpsc::Receiver<BlockItem>,
    cancel: CancellationToken,
    producer: Option<JoinHandle<()>>,
}

impl BlockSubscription {
    /// Create a connected sender/subscription pair with a bounded buffer.
    pub fn channel(capacity: usize) -> (BlockSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let sender = BlockSender {
            tx,
            cancel: cancel.clone(),
        };
        let sub = Self {
            rx,
            cancel,
            producer: None,
        };
        (sender, sub)
    }

    /// Attach the producer task so `unsubscribe` can wait for it.
    pub fn with_producer(mut self, handle: JoinHandle<()>) -> Self {
        self.producer = Some(handle);
        self
    }

    /// Stop delivery. Nothing is yielded after this returns. Idempotent.
    pub async fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(handle) = self.producer.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "block producer task failed");
            }
        }
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for BlockSubscription {
    type Item = BlockItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

impl Drop for BlockSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─── In-memory source (for testing) ───────────────────────────────────────────

/// Replays a fixed list of blocks, then behaves like an idle live chain.
///
/// Optionally ends every subscription with a terminal error after the replay.
pub struct ReplayBlockSource {
    blocks: Vec<Block>,
    head: Option<BlockNumber>,
    terminal_error: Option<SyncError>,
    capacity: usize,
    subscriptions: Mutex<Vec<BlockNumber>>,
}

impl ReplayBlockSource {
    /// The head defaults to the highest block number given.
    pub fn new(mut blocks: Vec<Block>) -> Self {
        blocks.sort_by_key(|b| b.number);
        let head = blocks.last().map(|b| b.number);
        Self {
            blocks,
            head,
            terminal_error: None,
            capacity: 16,
            subscriptions: Mutex::new(vec![]),
        }
    }

    /// Override the reported head; `None` makes `head_block_number` fail.
    pub fn with_head(mut self, head: Option<BlockNumber>) -> Self {
        self.head = head;
        self
    }

    /// End each subscription with `err` once the replay is delivered.
    pub fn then_fail(mut self, err: SyncError) -> Self {
        self.terminal_error = Some(err);
        self
    }

    /// Start numbers of every subscription opened so far.
    pub fn subscriptions(&self) -> Vec<BlockNumber> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockSource for ReplayBlockSource {
    async fn head_block_number(&self) -> Result<BlockNumber, SyncError> {
        self.head
            .ok_or_else(|| SyncError::Fetch("head block number unavailable".into()))
    }

    async fn subscribe(&self, start: BlockNumber) -> Result<BlockSubscription, SyncError> {
        self.subscriptions.lock().unwrap().push(start);

        let replay: Vec<Block> = self
            .blocks
            .iter()
            .filter(|b| b.number >= start)
            .cloned()
            .collect();
        let terminal = self.terminal_error.clone();
        let (sender, sub) = BlockSubscription::channel(self.capacity);

        let handle = tokio::spawn(async move {
            for block in replay {
                if !sender.send(Ok(block)).await {
                    return;
                }
            }
            match terminal {
                Some(err) => {
                    sender.send(Err(err)).await;
                }
                None => sender.cancelled().await,
            }
        });

        Ok(sub.with_producer(handle))
    }
}
