//! chainsync-core — checkpointed, ordered transaction ingestion.
//!
//! # Architecture
//!
//! ```text
//! SyncController ── BlockSource (producer task → bounded channel)
//!       │
//!       └── SyncPipeline, per block, strictly in order:
//!              Extractor → Dedup filter → BatchPersister → CheckpointManager
//!                              │               │                │
//!                        TransactionStore  TransactionStore  CheckpointStore
//! ```

pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod dedup;
pub mod error;
pub mod extractor;
pub mod persister;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, MemoryCheckpointStore};
pub use config::{FailurePolicy, SyncConfig, SyncState};
pub use controller::SyncController;
pub use error::{ErrorClass, SyncError};
pub use persister::{BatchPersister, PersistReport};
pub use pipeline::{BlockReport, SyncPipeline};
pub use source::{BlockSender, BlockSource, BlockSubscription, ReplayBlockSource};
pub use store::TransactionStore;
pub use types::{Block, BlockNumber, RawTransaction, TransactionRecord};
