//! chainsync-evm — JSON-RPC block source and builder API for EVM chains.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainsync_evm::{HttpRpcClient, SyncBuilder};
//! use chainsync_storage::InMemoryStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpRpcClient::default_for("https://eth.example.com")?;
//! let storage = Arc::new(InMemoryStorage::new());
//! let mut controller = SyncBuilder::new()
//!     .batch_size(100)
//!     .build_rpc(client, storage.clone(), storage);
//! controller.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod fetcher;
pub mod providers;
pub mod rpc;
pub mod source;

pub use builder::SyncBuilder;
pub use fetcher::EvmRpcClient;
pub use rpc::{HttpClientConfig, HttpRpcClient, RpcError};
pub use source::RpcBlockSource;
