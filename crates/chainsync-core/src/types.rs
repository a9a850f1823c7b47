//! Shared types for the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// Block height.
pub type BlockNumber = u64;

// ─── Block ────────────────────────────────────────────────────────────────────

/// A block as delivered by a [`BlockSource`](crate::source::BlockSource).
///
/// Only its number (via the checkpoint) and its transactions are ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block number.
    pub number: BlockNumber,
    /// Transactions in block order.
    pub transactions: Vec<RawTransaction>,
}

impl Block {
    pub fn new(number: BlockNumber, transactions: Vec<RawTransaction>) -> Self {
        Self { number, transactions }
    }

    /// A block without transactions.
    pub fn empty(number: BlockNumber) -> Self {
        Self::new(number, vec![])
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

// ─── RawTransaction ───────────────────────────────────────────────────────────

/// A transaction exactly as the node reported it.
///
/// Every field is optional so that malformed node output can be represented
/// and rejected by the extractor instead of failing deserialization of the
/// whole block. `value` is a node quantity: `0x`-prefixed hex or decimal digits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl RawTransaction {
    pub fn new(hash: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            from: Some(from.into()),
            ..Default::default()
        }
    }

    /// Set the recipient address.
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Set the transferred value (node quantity encoding).
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

// ─── TransactionRecord ────────────────────────────────────────────────────────

/// A normalized, persistable transaction.
///
/// `hash` is the identity key; records are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash (`0x…`).
    pub hash: String,
    /// Sender address.
    pub from_address: String,
    /// Recipient address; `None` for contract creation.
    pub to_address: Option<String>,
    /// Transferred value in wei, as a decimal string.
    pub value: String,
}
