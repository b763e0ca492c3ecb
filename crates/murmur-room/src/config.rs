//! Configuration for a room log

use std::path::PathBuf;

use murmur_core::{DEFAULT_MESSAGE_CAPACITY, DEFAULT_SENDER_CAPACITY};
use murmur_storage::MessageLogConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`RoomLog`](crate::RoomLog)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Durable message log file
    pub message_log: PathBuf,
    /// Sender directory journal file
    pub directory_journal: PathBuf,
    /// Number of messages kept in memory
    pub message_capacity: usize,
    /// Number of senders that may be active at once
    pub sender_capacity: usize,
    /// Sync every write to disk before acknowledging it
    pub sync_on_write: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::with_data_dir("./murmur-data")
    }
}

impl RoomConfig {
    /// Create a configuration keeping both files in `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            message_log: data_dir.join("messages.log"),
            directory_journal: data_dir.join("senders.log"),
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
            sender_capacity: DEFAULT_SENDER_CAPACITY,
            sync_on_write: true,
        }
    }

    /// Set the in-memory message capacity
    pub fn with_message_capacity(mut self, capacity: usize) -> Self {
        self.message_capacity = capacity;
        self
    }

    /// Set the active sender capacity
    pub fn with_sender_capacity(mut self, capacity: usize) -> Self {
        self.sender_capacity = capacity;
        self
    }

    /// Set whether writes are synced before returning
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Check the configuration before any file is touched
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.message_capacity == 0 {
            return Err(ConfigError::ZeroMessageCapacity);
        }
        if self.sender_capacity == 0 {
            return Err(ConfigError::ZeroSenderCapacity);
        }
        if self.message_log == self.directory_journal {
            return Err(ConfigError::SharedPath(self.message_log.clone()));
        }
        Ok(())
    }

    pub(crate) fn message_log_config(&self) -> MessageLogConfig {
        MessageLogConfig::new(&self.message_log).with_sync_on_write(self.sync_on_write)
    }
}
