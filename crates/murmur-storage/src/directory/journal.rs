//! Directory journal
//!
//! Append-only record of registrations and deactivations, framed exactly
//! like the message log but kept in its own file.

use std::path::{Path, PathBuf};

use futures::{Stream, TryStreamExt};
use murmur_core::{SenderId, Timestamp, validate_display_name};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::append_log::{FramedLog, LogOffset};
use crate::error::StorageError;

use super::session::SessionDirectory;

/// Magic bytes of a directory journal file
pub const DIRECTORY_JOURNAL_MAGIC: [u8; 4] = *b"MRDJ";

/// A change to the session directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryEvent {
    /// A sender was registered
    Registered {
        id: SenderId,
        display_name: String,
        registered_at: Timestamp,
    },
    /// A sender was deactivated
    Deactivated { id: SenderId },
}

impl DirectoryEvent {
    /// The sender the event is about
    pub fn sender_id(&self) -> SenderId {
        match self {
            DirectoryEvent::Registered { id, .. } | DirectoryEvent::Deactivated { id } => *id,
        }
    }
}

fn validate_event(event: &DirectoryEvent) -> Result<(), String> {
    match event {
        DirectoryEvent::Registered { display_name, .. } => {
            validate_display_name(display_name).map_err(|e| e.to_string())
        }
        DirectoryEvent::Deactivated { .. } => Ok(()),
    }
}

/// Durable journal of directory events
pub struct DirectoryJournal {
    inner: FramedLog<DirectoryEvent>,
}

impl DirectoryJournal {
    /// Open (or create) a journal, discarding any torn tail
    pub async fn open(path: impl Into<PathBuf>, sync_on_write: bool) -> Result<Self, StorageError> {
        let inner = FramedLog::open(
            path,
            DIRECTORY_JOURNAL_MAGIC,
            sync_on_write,
            validate_event,
        )
        .await?;
        Ok(Self { inner })
    }

    /// Durably record an event
    pub async fn append(&mut self, event: &DirectoryEvent) -> Result<LogOffset, StorageError> {
        let offset = self.inner.append(event).await?;
        debug!(offset = %offset, event = ?event, "Journaled directory event");
        Ok(offset)
    }

    /// Lazily replay every valid event, oldest first
    pub fn replay(&self) -> impl Stream<Item = Result<DirectoryEvent, StorageError>> + Send + 'static {
        self.inner.replay().map_ok(|entry| entry.record)
    }

    /// Rebuild a directory from the journal
    pub async fn load(&self, capacity: usize) -> Result<SessionDirectory, StorageError> {
        let mut directory = SessionDirectory::new(capacity);
        let mut events = std::pin::pin!(self.replay());
        while let Some(event) = events.try_next().await? {
            directory.apply(&event);
        }
        Ok(directory)
    }

    /// Number of events in the journal
    pub fn record_count(&self) -> u64 {
        self.inner.record_count()
    }

    /// Path of the journal file
    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

impl std::fmt::Debug for DirectoryJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryJournal")
            .field("path", &self.inner.path())
            .field("records", &self.inner.record_count())
            .finish()
    }
}
