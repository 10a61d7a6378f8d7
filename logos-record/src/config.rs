//! Record timing and write-policy configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What happens to writes issued before the first snapshot arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingWrites {
    /// Log and discard the write
    #[default]
    Drop,
    /// Keep writes in order and apply them right after the record becomes ready
    Queue,
}

/// Record configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Deadline for the subscribe acknowledgment after creation
    pub read_ack_timeout_ms: u64,
    /// Deadline for the first snapshot after creation
    pub read_timeout_ms: u64,
    /// Deadline for the unsubscribe acknowledgment after the last discard
    pub subscription_timeout_ms: u64,
    /// Deadline for the delete acknowledgment
    pub delete_timeout_ms: u64,
    /// Handling of writes before ready
    pub pending_writes: PendingWrites,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            read_ack_timeout_ms: 1000,
            read_timeout_ms: 3000,
            subscription_timeout_ms: 2000,
            delete_timeout_ms: 3000,
            pending_writes: PendingWrites::Drop,
        }
    }
}

impl RecordConfig {
    /// Create config for testing (short deadlines).
    pub fn for_testing() -> Self {
        Self {
            read_ack_timeout_ms: 50,
            read_timeout_ms: 100,
            subscription_timeout_ms: 50,
            delete_timeout_ms: 50,
            pending_writes: PendingWrites::Drop,
        }
    }

    pub fn read_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.read_ack_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn subscription_timeout(&self) -> Duration {
        Duration::from_millis(self.subscription_timeout_ms)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_millis(self.delete_timeout_ms)
    }
}
