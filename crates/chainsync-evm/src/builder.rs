//! Fluent builder API for creating sync controllers.
//!
//! # Example
//!
//! ```rust,no_run
//! use chainsync_core::FailurePolicy;
//! use chainsync_evm::SyncBuilder;
//!
//! let config = SyncBuilder::new()
//!     .batch_size(250)
//!     .checkpoint_interval(10)
//!     .failure_policy(FailurePolicy::Halt)
//!     .build_config();
//! ```

use std::sync::Arc;

use chainsync_core::checkpoint::CheckpointStore;
use chainsync_core::config::{FailurePolicy, SyncConfig};
use chainsync_core::controller::SyncController;
use chainsync_core::source::BlockSource;
use chainsync_core::store::TransactionStore;

use crate::fetcher::EvmRpcClient;
use crate::source::RpcBlockSource;

/// Fluent builder for [`SyncConfig`] and [`SyncController`].
#[derive(Default)]
pub struct SyncBuilder {
    config: SyncConfig,
}

impl SyncBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Set the checkpoint key.
    pub fn checkpoint_key(mut self, key: impl Into<String>) -> Self {
        self.config.checkpoint_key = key.into();
        self
    }

    /// Set the number of records per bulk write.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set checkpoint save interval (every N blocks).
    pub fn checkpoint_interval(mut self, n: u64) -> Self {
        self.config.checkpoint_interval = n;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set live mode polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn save_checkpoint_on_stop(mut self, yes: bool) -> Self {
        self.config.save_checkpoint_on_stop = yes;
        self
    }

    /// Build the `SyncConfig`.
    pub fn build_config(self) -> SyncConfig {
        self.config
    }

    /// Build a controller over any block source.
    pub fn build(
        self,
        source: Arc<dyn BlockSource>,
        transactions: Arc<dyn TransactionStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> SyncController {
        SyncController::new(source, transactions, checkpoints, self.config)
    }

    /// Build a controller reading blocks from a JSON-RPC node.
    pub fn build_rpc<C: EvmRpcClient + 'static>(
        self,
        client: C,
        transactions: Arc<dyn TransactionStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> SyncController {
        let source = Arc::new(RpcBlockSource::from_config(client, &self.config));
        self.build(source, transactions, checkpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainsync_core::config::SyncState;
    use chainsync_core::types::{Block, BlockNumber};
    use chainsync_storage::InMemoryStorage;

    use crate::rpc::RpcError;

    #[test]
    fn builder_defaults() {
        let cfg = SyncBuilder::new().build_config();
        assert_eq!(cfg.checkpoint_key, "transactions");
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.checkpoint_interval, 1);
        assert_eq!(cfg.failure_policy, FailurePolicy::Continue);
        assert!(cfg.save_checkpoint_on_stop);
    }

    #[test]
    fn builder_custom() {
        let cfg = SyncBuilder::new()
            .checkpoint_key("mainnet-txs")
            .batch_size(500)
            .checkpoint_interval(25)
            .channel_capacity(8)
            .poll_interval_ms(12_000)
            .failure_policy(FailurePolicy::Halt)
            .save_checkpoint_on_stop(false)
            .build_config();

        assert_eq!(cfg.checkpoint_key, "mainnet-txs");
        assert_eq!(cfg.batch_size, 500);
        assert_eq!(cfg.checkpoint_interval, 25);
        assert_eq!(cfg.channel_capacity, 8);
        assert_eq!(cfg.poll_interval_ms, 12_000);
        assert_eq!(cfg.failure_policy, FailurePolicy::Halt);
        assert!(!cfg.save_checkpoint_on_stop);
    }

    struct Genesis;

    #[async_trait]
    impl EvmRpcClient for Genesis {
        async fn get_block_number(&self) -> Result<BlockNumber, RpcError> {
            Ok(0)
        }
        async fn get_block(&self, number: BlockNumber) -> Result<Option<Block>, RpcError> {
            Ok(Some(Block::empty(number)))
        }
    }

    #[tokio::test]
    async fn rpc_controller_starts_and_stops() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut ctrl = SyncBuilder::new()
            .poll_interval_ms(5)
            .build_rpc(Genesis, storage.clone(), storage.clone());

        assert_eq!(ctrl.state(), SyncState::Stopped);
        ctrl.start().await.unwrap();
        assert_eq!(ctrl.state(), SyncState::Running);
        ctrl.stop().await;
        assert_eq!(ctrl.state(), SyncState::Stopped);
        assert_eq!(ctrl.config().poll_interval_ms, 5);
    }
}
