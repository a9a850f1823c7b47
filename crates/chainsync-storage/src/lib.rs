//! chainsync-storage — storage backends for chainsync.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)
//!
//! Each backend implements both `TransactionStore` and `CheckpointStore`, so
//! one `Arc` can be handed to the controller for both roles.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{InMemoryStorage, StorageStats};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
