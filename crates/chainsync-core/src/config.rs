//! Sync configuration and controller state types.

use serde::{Deserialize, Serialize};

use crate::checkpoint::DEFAULT_CHECKPOINT_KEY;
use crate::persister::DEFAULT_BATCH_SIZE;

/// What the controller does after a block fails to process.
///
/// Under both policies the checkpoint never moves past a failed block, so a
/// restart replays from the first failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep ingesting later blocks, but hold the checkpoint at the last
    /// contiguously successful block for the rest of the run.
    #[default]
    Continue,
    /// End the subscription on the first failed block.
    Halt,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "halt" => Ok(Self::Halt),
            other => Err(format!("unknown failure policy: {other}")),
        }
    }
}

/// Configuration for a sync controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Fixed identity of the checkpoint entry.
    pub checkpoint_key: String,
    /// Records per bulk write.
    pub batch_size: usize,
    /// Write the checkpoint every N successful blocks.
    pub checkpoint_interval: u64,
    /// Blocks buffered between the source's producer task and the controller.
    pub channel_capacity: usize,
    /// Head polling interval for live sources (milliseconds).
    pub poll_interval_ms: u64,
    /// Block-level failure policy.
    pub failure_policy: FailurePolicy,
    /// Persist the checkpoint one final time on shutdown.
    pub save_checkpoint_on_stop: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            checkpoint_key: DEFAULT_CHECKPOINT_KEY.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint_interval: 1,
            channel_capacity: 64,
            poll_interval_ms: 2000,
            failure_policy: FailurePolicy::Continue,
            save_checkpoint_on_stop: true,
        }
    }
}

/// Lifecycle state of a [`SyncController`](crate::controller::SyncController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Stopped,
    /// Loading the checkpoint and opening the subscription.
    Starting,
    /// Consuming blocks.
    Running,
    /// Unsubscribing and finishing the in-flight block.
    Stopping,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}
