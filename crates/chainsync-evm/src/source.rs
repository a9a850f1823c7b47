//! Polling block source over JSON-RPC.
//!
//! Each subscription spawns a producer task that replays `start..=head`, then
//! polls `eth_blockNumber` every `poll_interval` and fetches new blocks in
//! order. The first RPC failure is delivered as the subscription's terminal
//! error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use chainsync_core::config::SyncConfig;
use chainsync_core::error::SyncError;
use chainsync_core::source::{BlockSender, BlockSource, BlockSubscription};
use chainsync_core::types::BlockNumber;

use crate::fetcher::EvmRpcClient;
use crate::rpc::RpcError;

/// [`BlockSource`] backed by an [`EvmRpcClient`].
pub struct RpcBlockSource<C> {
    client: Arc<C>,
    poll_interval: Duration,
    capacity: usize,
}

impl<C: EvmRpcClient + 'static> RpcBlockSource<C> {
    pub fn new(client: C) -> Self {
        Self::from_config(client, &SyncConfig::default())
    }

    /// Take the poll interval and channel capacity from `config`.
    pub fn from_config(client: C, config: &SyncConfig) -> Self {
        Self {
            client: Arc::new(client),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            capacity: config.channel_capacity,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: EvmRpcClient + 'static> BlockSource for RpcBlockSource<C> {
    async fn head_block_number(&self) -> Result<BlockNumber, SyncError> {
        Ok(self.client.get_block_number().await?)
    }

    async fn subscribe(&self, start: BlockNumber) -> Result<BlockSubscription, SyncError> {
        let (sender, sub) = BlockSubscription::channel(self.capacity);
        let handle = tokio::spawn(produce(
            Arc::clone(&self.client),
            sender,
            start,
            self.poll_interval,
        ));
        info!(start, "block subscription opened");
        Ok(sub.with_producer(handle))
    }
}

/// Producer loop. Returns when the subscriber goes away or after sending an error.
async fn produce<C: EvmRpcClient>(
    client: Arc<C>,
    sender: BlockSender,
    start: BlockNumber,
    poll_interval: Duration,
) {
    let mut next = start;
    loop {
        let head = tokio::select! {
            biased;
            _ = sender.cancelled() => return,
            head = client.get_block_number() => head,
        };
        let head = match head {
            Ok(h) => h,
            Err(e) => return fail(&sender, next, e).await,
        };

        while next <= head {
            let fetched = tokio::select! {
                biased;
                _ = sender.cancelled() => return,
                block = client.get_block(next) => block,
            };
            match fetched {
                Ok(Some(block)) if block.number == next => {
                    if !sender.send(Ok(block)).await {
                        return;
                    }
                    next += 1;
                }
                Ok(Some(block)) => {
                    let e = RpcError::Malformed(format!(
                        "asked for block {next}, node returned {}",
                        block.number
                    ));
                    return fail(&sender, next, e).await;
                }
                Ok(None) => {
                    // Head moved ahead of what this node serves; retry next poll.
                    debug!(block = next, head, "block not available yet");
                    break;
                }
                Err(e) => return fail(&sender, next, e).await,
            }
        }

        tokio::select! {
            biased;
            _ = sender.cancelled() => return,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

async fn fail(sender: &BlockSender, block: BlockNumber, e: RpcError) {
    warn!(block, error = %e, "block fetch failed, ending subscription");
    sender.send(Err(e.into())).await;
}
