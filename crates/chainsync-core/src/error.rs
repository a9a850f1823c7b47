//! Error types for the chainsync pipeline.

use thiserror::Error;

/// Errors that can occur while ingesting blocks.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Block source error: {0}")]
    Fetch(String),

    #[error("Duplicate transaction hash {hash}")]
    DuplicateKey { hash: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Block {block_number} incomplete: {dropped} record(s) dropped")]
    BlockIncomplete { block_number: u64, dropped: usize },

    #[error("Malformed transaction #{index} in block {block_number}: {reason}")]
    Extraction {
        block_number: u64,
        index: usize,
        reason: String,
    },

    #[error("Cannot start sync: {0}")]
    Startup(String),
}

/// Coarse classification used by the controller's skip-vs-abort policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The block subscription failed; it ends and a restart is the recovery path.
    TransientFetch,
    /// The record is already stored. Never an error for the pipeline.
    DuplicateKey,
    /// Storage rejected a write or a lookup.
    Persistence,
    /// A raw transaction could not be normalized.
    Extraction,
    /// No starting point could be determined.
    FatalStartup,
}

impl SyncError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Fetch(_) => ErrorClass::TransientFetch,
            Self::DuplicateKey { .. } => ErrorClass::DuplicateKey,
            Self::Storage(_) | Self::BlockIncomplete { .. } => ErrorClass::Persistence,
            Self::Extraction { .. } => ErrorClass::Extraction,
            Self::Startup(_) => ErrorClass::FatalStartup,
        }
    }

    /// Returns `true` if the error is a duplicate-key conflict (skippable).
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Returns `true` if the error must prevent the controller from running.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::FatalStartup
    }
}
