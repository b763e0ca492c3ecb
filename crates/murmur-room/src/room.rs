//! The room log facade
//!
//! [`RoomLog`] owns the three stores of a room: the durable message log, the
//! in-memory ring of recent messages and the sender directory (plus its
//! journal). Every mutation goes through a single async writer lock so that
//! a message is written to disk before it becomes visible in the ring.
//! Readers take a short synchronous read lock on the in-memory view and never
//! wait for disk I/O.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::TryStreamExt;
use murmur_core::{
    Clock, Message, Sender, SenderId, SystemClock, Timestamp, ValidationError, validate_body,
};
use murmur_storage::{
    CompactionResult, DirectoryEvent, DirectoryJournal, MessageLog, RingStore, SessionDirectory,
    StorageError,
};
use parking_lot::RwLock;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::RoomConfig;
use crate::error::{AppendError, ConfigError, DirectoryError, RoomError, RoomResult};
use crate::transcript::TranscriptLine;

/// Lifecycle state of a room log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Created but not yet recovered; only `recover` is accepted
    Uninitialized,
    /// Recovered and accepting appends
    Ready,
}

/// What a call to [`RoomLog::recover`] found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Messages read from the durable log
    pub messages_replayed: u64,
    /// Replayed messages that did not fit in the ring
    pub messages_evicted: u64,
    /// Senders in the directory, active or not
    pub senders_known: usize,
    /// Senders currently active
    pub senders_active: usize,
}

/// Durable state; only touched with the writer lock held
struct Writer {
    messages: Option<MessageLog>,
    journal: Option<DirectoryJournal>,
    /// Timestamp of the newest durable message
    last_timestamp: Option<Timestamp>,
}

/// In-memory projection served to readers
struct View {
    ring: RingStore<Message>,
    directory: SessionDirectory,
}

impl View {
    fn empty(config: &RoomConfig) -> Self {
        Self {
            ring: RingStore::new(config.message_capacity),
            directory: SessionDirectory::new(config.sender_capacity),
        }
    }
}

/// A ring rebuilt from the durable log
struct Replayed {
    ring: RingStore<Message>,
    replayed: u64,
    evicted: u64,
    last_timestamp: Option<Timestamp>,
}

/// Replay the whole message log into a fresh ring of `capacity`
async fn replay_ring(log: &MessageLog, capacity: usize) -> Result<Replayed, StorageError> {
    let mut out = Replayed {
        ring: RingStore::new(capacity),
        replayed: 0,
        evicted: 0,
        last_timestamp: None,
    };

    let mut stream = pin!(log.replay());
    while let Some(message) = stream.try_next().await? {
        out.last_timestamp = out.last_timestamp.max(Some(message.timestamp));
        if out.ring.insert(message).is_some() {
            out.evicted += 1;
        }
        out.replayed += 1;
    }
    Ok(out)
}

/// A durable, bounded chat-room log
pub struct RoomLog<C: Clock = SystemClock> {
    config: RoomConfig,
    clock: C,
    writer: Mutex<Writer>,
    view: RwLock<View>,
    ready: AtomicBool,
}

impl RoomLog<SystemClock> {
    /// Create a room log using the system clock
    ///
    /// No file is opened until [`RoomLog::recover`] runs.
    pub fn new(config: RoomConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RoomLog<C> {
    /// Create a room log with a custom clock
    pub fn with_clock(config: RoomConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let view = View::empty(&config);
        Ok(Self {
            config,
            clock,
            writer: Mutex::new(Writer {
                messages: None,
                journal: None,
                last_timestamp: None,
            }),
            view: RwLock::new(view),
            ready: AtomicBool::new(false),
        })
    }

    /// The configuration this room was created with
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> RoomState {
        if self.ready.load(Ordering::Acquire) {
            RoomState::Ready
        } else {
            RoomState::Uninitialized
        }
    }

    /// Whether the room has been recovered
    pub fn is_ready(&self) -> bool {
        self.state() == RoomState::Ready
    }

    /// Rebuild the in-memory view from disk
    ///
    /// Opens the logs on the first call. Every call replays both logs from
    /// the start into fresh stores, so calling it again yields the same
    /// view. A record cut short by a crash ends the replay quietly, while
    /// damage followed by further records fails with a storage error. On
    /// error the previous view and state are kept.
    #[instrument(skip(self), fields(log = %self.config.message_log.display()))]
    pub async fn recover(&self) -> RoomResult<RecoveryReport> {
        let mut guard = self.writer.lock().await;
        let writer = &mut *guard;

        let journal = match &mut writer.journal {
            Some(journal) => journal,
            empty => empty.insert(
                DirectoryJournal::open(&self.config.directory_journal, self.config.sync_on_write)
                    .await?,
            ),
        };
        let directory = journal.load(self.config.sender_capacity).await?;

        let messages = match &mut writer.messages {
            Some(messages) => messages,
            empty => empty.insert(MessageLog::open(self.config.message_log_config()).await?),
        };

        let Replayed {
            ring,
            replayed,
            evicted,
            last_timestamp,
        } = replay_ring(messages, self.config.message_capacity).await?;

        let report = RecoveryReport {
            messages_replayed: replayed,
            messages_evicted: evicted,
            senders_known: directory.len(),
            senders_active: directory.active_count(),
        };

        writer.last_timestamp = last_timestamp;
        *self.view.write() = View { ring, directory };
        self.ready.store(true, Ordering::Release);

        info!(
            replayed = report.messages_replayed,
            evicted = report.messages_evicted,
            senders = report.senders_known,
            active = report.senders_active,
            "Room recovered"
        );
        Ok(report)
    }

    /// Register a new sender and return its id
    #[instrument(skip(self))]
    pub async fn register(&self, display_name: &str) -> Result<SenderId, DirectoryError> {
        if !self.is_ready() {
            return Err(DirectoryError::NotReady);
        }

        let mut guard = self.writer.lock().await;
        let Some(journal) = guard.journal.as_mut() else {
            return Err(DirectoryError::NotReady);
        };

        let event = self
            .view
            .read()
            .directory
            .prepare_registration(display_name, self.clock.now())?;
        journal
            .append(&event)
            .await
            .map_err(DirectoryError::PersistenceFailed)?;
        self.view.write().directory.apply(&event);

        let id = event.sender_id();
        info!(id = %id, "Sender registered");
        Ok(id)
    }

    /// Deactivate a sender
    ///
    /// Returns `true` if the sender was active. Unknown and already inactive
    /// ids are accepted and change nothing.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: SenderId) -> Result<bool, DirectoryError> {
        if !self.is_ready() {
            return Err(DirectoryError::NotReady);
        }

        let mut guard = self.writer.lock().await;
        let Some(journal) = guard.journal.as_mut() else {
            return Err(DirectoryError::NotReady);
        };

        let active = self.view.read().directory.is_active(id);
        if !active {
            debug!(id = %id, "Sender already inactive");
            return Ok(false);
        }

        let event = DirectoryEvent::Deactivated { id };
        journal
            .append(&event)
            .await
            .map_err(DirectoryError::PersistenceFailed)?;
        self.view.write().directory.apply(&event);

        info!(id = %id, "Sender deactivated");
        Ok(true)
    }

    /// Durably append a message and make it visible
    ///
    /// Checks run in order: state, sender, body length. Nothing is stored
    /// when any of them fails, and a failed disk write leaves the room
    /// ready for a retry.
    #[instrument(skip(self, body), fields(sender = %sender_id))]
    pub async fn append(
        &self,
        sender_id: SenderId,
        body: impl Into<String>,
    ) -> Result<Message, AppendError> {
        if !self.is_ready() {
            return Err(AppendError::NotReady);
        }

        let mut guard = self.writer.lock().await;
        let writer = &mut *guard;
        let Some(log) = writer.messages.as_mut() else {
            return Err(AppendError::NotReady);
        };

        let active = self.view.read().directory.is_active(sender_id);
        if !active {
            return Err(AppendError::UnknownSender(sender_id));
        }

        let body = body.into();
        if let Err(ValidationError::BodyTooLong { len, max }) = validate_body(&body) {
            return Err(AppendError::BodyTooLong { len, max });
        }

        let timestamp = Timestamp::monotonic(self.clock.now(), writer.last_timestamp);
        let message = Message::new(sender_id, timestamp, body);

        if let Err(e) = log.append(&message).await {
            warn!(error = %e, class = ?e.class(), "Message not persisted");
            return Err(AppendError::PersistenceFailed(e));
        }
        writer.last_timestamp = Some(timestamp);

        let evicted = self.view.write().ring.insert(message.clone());
        if let Some(old) = evicted {
            debug!(evicted_at = %old.timestamp.as_micros(), "Evicted oldest message");
        }
        Ok(message)
    }

    /// Up to the last `k` visible messages, oldest first
    pub fn tail(&self, k: usize) -> Vec<Message> {
        self.view.read().ring.tail(k)
    }

    /// Every visible message, oldest first
    pub fn snapshot(&self) -> Vec<Message> {
        self.view.read().ring.snapshot()
    }

    /// Look up a sender, active or not
    pub fn lookup(&self, id: SenderId) -> Option<Sender> {
        self.view.read().directory.lookup(id).cloned()
    }

    /// Currently active senders, by id
    pub fn list_active(&self) -> Vec<Sender> {
        self.view.read().directory.list_active()
    }

    /// Every sender ever registered, by id
    pub fn senders(&self) -> Vec<Sender> {
        self.view.read().directory.all().cloned().collect()
    }

    /// The last `k` visible messages joined with their senders
    pub fn transcript_tail(&self, k: usize) -> Vec<TranscriptLine> {
        let view = self.view.read();
        view.ring
            .tail(k)
            .iter()
            .map(|m| TranscriptLine::new(m, view.directory.lookup(m.sender_id)))
            .collect()
    }

    /// Number of visible messages
    pub fn len(&self) -> usize {
        self.view.read().ring.len()
    }

    /// Whether no messages are visible
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the durable log keeping only messages that satisfy `retain`
    ///
    /// The ring is rebuilt from the rewritten log before the writer lock is
    /// released, so readers never see a message that is no longer on disk.
    /// The ring is rebuilt even when the rewrite fails, since a failure after
    /// the rename still leaves the compacted file in place.
    #[instrument(skip_all)]
    pub async fn compact<F>(&self, retain: F) -> RoomResult<CompactionResult>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut guard = self.writer.lock().await;
        let Some(log) = guard.messages.as_mut() else {
            return Err(RoomError::NotReady);
        };

        let outcome = log.compact(retain).await;
        let rebuilt = replay_ring(log, self.config.message_capacity).await?;
        self.view.write().ring = rebuilt.ring;

        let result = outcome?;
        info!(
            retained = result.records_retained,
            dropped = result.records_dropped,
            freed = result.bytes_freed(),
            "Message log compacted"
        );
        Ok(result)
    }

    /// Drop every logged message that has already left the ring
    pub async fn compact_to_window(&self) -> RoomResult<CompactionResult> {
        if !self.is_ready() {
            return Err(RoomError::NotReady);
        }
        let oldest = self.view.read().ring.oldest().map(|m| m.timestamp);
        match oldest {
            Some(oldest) => self.compact(|m| m.timestamp >= oldest).await,
            None => self.compact(|_| false).await,
        }
    }

    /// Write the full history, including evicted messages, as transcript
    /// lines
    ///
    /// Holds the writer lock for the duration so the export is a consistent
    /// prefix of the log. Returns the number of lines written.
    #[instrument(skip_all)]
    pub async fn export_transcript<W>(&self, out: &mut W) -> RoomResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let guard = self.writer.lock().await;
        let Some(log) = guard.messages.as_ref() else {
            return Err(RoomError::NotReady);
        };
        let directory = self.view.read().directory.clone();

        let mut lines = 0u64;
        let mut stream = pin!(log.replay());
        while let Some(message) = stream.try_next().await? {
            let line = TranscriptLine::new(&message, directory.lookup(message.sender_id));
            out.write_all(format!("{}\n", line).as_bytes())
                .await
                .map_err(murmur_storage::StorageError::from)?;
            lines += 1;
        }
        out.flush().await.map_err(murmur_storage::StorageError::from)?;

        info!(lines, "Transcript exported");
        Ok(lines)
    }

    /// Sync the message log and release both files
    ///
    /// The room returns to [`RoomState::Uninitialized`]; a later
    /// [`RoomLog::recover`] reopens everything.
    pub async fn close(&self) -> RoomResult<()> {
        let mut guard = self.writer.lock().await;
        self.ready.store(false, Ordering::Release);
        guard.journal = None;
        guard.last_timestamp = None;
        if let Some(log) = guard.messages.take() {
            log.close().await?;
        }
        *self.view.write() = View::empty(&self.config);
        info!("Room closed");
        Ok(())
    }
}

impl<C: Clock> std::fmt::Debug for RoomLog<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomLog")
            .field("message_log", &self.config.message_log)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use murmur_core::ManualClock;
    use murmur_storage::FailPoint;
    use tempfile::TempDir;

    fn bodies(room: &RoomLog<Arc<ManualClock>>) -> Vec<String> {
        room.snapshot().into_iter().map(|m| m.body).collect()
    }

    async fn ready_room() -> (RoomLog<Arc<ManualClock>>, Arc<ManualClock>, TempDir) {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Timestamp::from_micros(1_000_000)));
        let room =
            RoomLog::with_clock(RoomConfig::with_data_dir(temp.path()), Arc::clone(&clock)).unwrap();
        room.recover().await.unwrap();
        (room, clock, temp)
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_room_ready() {
        let (room, _clock, _temp) = ready_room().await;
        let alice = room.register("alice").await.unwrap();
        room.append(alice, "first").await.unwrap();

        room.writer
            .lock()
            .await
            .messages
            .as_mut()
            .unwrap()
            .inject_failure(FailPoint::TornWrite(std::io::ErrorKind::StorageFull));

        let err = room.append(alice, "lost").await.unwrap_err();
        assert!(matches!(err, AppendError::PersistenceFailed(_)));
        assert!(err.is_retryable());
        assert_eq!(room.state(), RoomState::Ready);
        assert_eq!(room.snapshot().len(), 1);

        // The retry goes through and the failed attempt left no trace
        room.append(alice, "retried").await.unwrap();
        let bodies: Vec<_> = room.snapshot().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, vec!["first", "retried"]);

        room.recover().await.unwrap();
        let bodies: Vec<_> = room.snapshot().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, vec!["first", "retried"]);
    }

    #[tokio::test]
    async fn test_timestamps_survive_clock_going_backwards() {
        let (room, clock, _temp) = ready_room().await;
        let alice = room.register("alice").await.unwrap();

        let first = room.append(alice, "a").await.unwrap();
        clock.set(Timestamp::from_micros(10));
        let second = room.append(alice, "b").await.unwrap();
        assert!(second.timestamp > first.timestamp);

        // Recovery restores the high-water mark
        room.recover().await.unwrap();
        let third = room.append(alice, "c").await.unwrap();
        assert!(third.timestamp > second.timestamp);
    }

    #[tokio::test]
    async fn test_close_and_reopen() {
        let (room, _clock, _temp) = ready_room().await;
        let alice = room.register("alice").await.unwrap();
        room.append(alice, "kept").await.unwrap();

        room.close().await.unwrap();
        assert_eq!(room.state(), RoomState::Uninitialized);
        assert!(room.is_empty());
        assert!(matches!(
            room.append(alice, "late").await,
            Err(AppendError::NotReady)
        ));

        let report = room.recover().await.unwrap();
        assert_eq!(report.messages_replayed, 1);
        assert_eq!(room.snapshot()[0].body, "kept");
    }

    #[tokio::test]
    async fn test_compact_shows_only_what_is_on_disk() {
        let (room, _clock, _temp) = ready_room().await;
        let alice = room.register("alice").await.unwrap();
        for body in ["m0", "m1", "m2"] {
            room.append(alice, body).await.unwrap();
        }

        let result = room.compact(|m| m.body != "m1").await.unwrap();
        assert_eq!(result.records_dropped, 1);
        let visible = bodies(&room);
        assert_eq!(visible, vec!["m0", "m2"]);

        room.recover().await.unwrap();
        assert_eq!(bodies(&room), visible);
    }

    #[tokio::test]
    async fn test_failure_after_compaction_rename_keeps_view_and_log_in_step() {
        let (room, _clock, _temp) = ready_room().await;
        let alice = room.register("alice").await.unwrap();
        for body in ["m0", "m1", "m2"] {
            room.append(alice, body).await.unwrap();
        }

        room.writer
            .lock()
            .await
            .messages
            .as_mut()
            .unwrap()
            .inject_failure(FailPoint::AfterRename(std::io::ErrorKind::Other));
        assert!(room.compact(|m| m.body != "m0").await.is_err());
        assert_eq!(bodies(&room), vec!["m1", "m2"]);

        // The next append reaches the live file
        room.append(alice, "m3").await.unwrap();
        room.recover().await.unwrap();
        assert_eq!(bodies(&room), vec!["m1", "m2", "m3"]);
    }
}
