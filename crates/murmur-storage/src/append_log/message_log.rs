//! Durable message log
//!
//! The on-disk record of every message a room has accepted. A message is
//! durable once [`MessageLog::append`] returns; until then callers must treat
//! it as lost.

use std::path::{Path, PathBuf};

use futures::{Stream, TryStreamExt};
use murmur_core::{Message, ValidationError, validate_body};
use tracing::{debug, instrument};

use super::compaction::CompactionResult;
#[cfg(any(test, feature = "failpoints"))]
use super::framed_log::FailPoint;
use super::framed_log::{FramedLog, LogEntry, LogOffset};
use crate::error::StorageError;

/// Magic bytes of a message log file
pub const MESSAGE_LOG_MAGIC: [u8; 4] = *b"MRML";

/// Configuration for a message log
#[derive(Debug, Clone)]
pub struct MessageLogConfig {
    /// Path of the log file
    pub path: PathBuf,
    /// Whether to sync writes to disk before `append` returns
    ///
    /// Turning this off trades crash durability for throughput.
    pub sync_on_write: bool,
}

impl Default for MessageLogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./murmur-data/messages.log"),
            sync_on_write: true,
        }
    }
}

impl MessageLogConfig {
    /// Create a configuration for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set whether writes are synced before returning
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }
}

/// Append-only, crash-safe log of messages
pub struct MessageLog {
    inner: FramedLog<Message>,
}

fn validate_message(message: &Message) -> Result<(), String> {
    validate_body(&message.body).map_err(|e| e.to_string())
}

impl MessageLog {
    /// Open (or create) the log, discarding any torn tail left by a crash
    #[instrument(skip_all, fields(path = %config.path.display()))]
    pub async fn open(config: MessageLogConfig) -> Result<Self, StorageError> {
        let inner = FramedLog::open(
            config.path,
            MESSAGE_LOG_MAGIC,
            config.sync_on_write,
            validate_message,
        )
        .await?;
        Ok(Self { inner })
    }

    /// Durably append a message
    ///
    /// Returns the byte offset of the new record. On error nothing has been
    /// appended.
    pub async fn append(&mut self, message: &Message) -> Result<LogOffset, StorageError> {
        if let Err(ValidationError::BodyTooLong { len, max }) = validate_body(&message.body) {
            return Err(StorageError::RecordTooLarge { len, max });
        }

        let offset = self.inner.append(message).await?;
        debug!(
            offset = %offset,
            sender = %message.sender_id,
            len = message.body.len(),
            "Appended message"
        );
        Ok(offset)
    }

    /// Lazily replay every valid message, oldest first
    ///
    /// The stream is finite and may be requested any number of times. A
    /// record cut short by a crash ends the stream instead of failing it.
    pub fn replay(&self) -> impl Stream<Item = Result<Message, StorageError>> + Send + 'static {
        self.inner.replay().map_ok(|entry| entry.record)
    }

    /// Like [`MessageLog::replay`] but with record offsets
    pub fn entries(&self) -> impl Stream<Item = Result<LogEntry<Message>, StorageError>> + Send + 'static {
        self.inner.replay()
    }

    /// Rewrite the log keeping only messages that satisfy `retain`
    #[instrument(skip_all, fields(path = %self.inner.path().display()))]
    pub async fn compact<F>(&mut self, retain: F) -> Result<CompactionResult, StorageError>
    where
        F: FnMut(&Message) -> bool,
    {
        self.inner.rewrite(retain).await
    }

    /// Number of messages in the log
    pub fn record_count(&self) -> u64 {
        self.inner.record_count()
    }

    /// Size of the log file in bytes
    pub fn len_bytes(&self) -> u64 {
        self.inner.len_bytes()
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Arm a fault for the next matching append or compaction
    ///
    /// Failed frames are rolled back exactly like a real I/O error.
    #[cfg(any(test, feature = "failpoints"))]
    pub fn inject_failure(&mut self, failpoint: FailPoint) {
        self.inner.inject_failure(failpoint);
    }

    /// Sync and close the log
    pub async fn close(mut self) -> Result<(), StorageError> {
        self.inner.sync().await
    }
}

impl std::fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLog")
            .field("path", &self.inner.path())
            .field("records", &self.inner.record_count())
            .field("bytes", &self.inner.len_bytes())
            .finish()
    }
}
