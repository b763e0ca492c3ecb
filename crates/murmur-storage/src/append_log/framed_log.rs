//! Generic append-only framed log
//!
//! Shared machinery behind the message log and the directory journal:
//! header management, torn-tail repair on open, fsync'd appends, lazy replay,
//! and crash-atomic rewrites.

use std::io::SeekFrom;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use futures::{Stream, TryStreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use super::compaction::CompactionResult;
use super::frame::{
    FrameRead, HEADER_LEN, HeaderCheck, Magic, encode_frame, encode_header, read_frame,
    read_header,
};
use crate::error::StorageError;

/// Byte offset of a record within its log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogOffset(pub u64);

impl std::fmt::Display for LogOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A replayed record together with its position
#[derive(Debug, Clone)]
pub struct LogEntry<T> {
    /// Where the frame starts
    pub offset: LogOffset,
    /// Bytes the frame occupies
    pub frame_len: u64,
    /// The decoded record
    pub record: T,
}

/// Record-level validity check applied after a frame decodes
pub type Validator<T> = fn(&T) -> Result<(), String>;

/// A fault to inject into the next matching log operation
#[cfg(any(test, feature = "failpoints"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Write half of the next frame, then fail
    TornWrite(std::io::ErrorKind),
    /// Like `TornWrite`, and the rollback of the half frame fails as well
    TornWriteUnrolled(std::io::ErrorKind),
    /// Fail the next rewrite right after its rename
    AfterRename(std::io::ErrorKind),
}

/// Append-only log of postcard-encoded records
pub(crate) struct FramedLog<T> {
    path: PathBuf,
    magic: Magic,
    sync_on_write: bool,
    validate: Validator<T>,
    file: File,
    /// End of the last durable frame; the next append goes here
    end: u64,
    records: u64,
    /// Set when a failed append could not be rolled back
    needs_repair: bool,
    /// Set once a rewrite has renamed over the file `file` points at
    needs_reopen: bool,
    #[cfg(any(test, feature = "failpoints"))]
    failpoint: Option<FailPoint>,
    #[cfg(any(test, feature = "failpoints"))]
    fail_rollback: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FramedLog<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Open (or create) a log, repairing a torn tail if one is found
    pub(crate) async fn open(
        path: impl Into<PathBuf>,
        magic: Magic,
        sync_on_write: bool,
        validate: Validator<T>,
    ) -> Result<Self, StorageError> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = temp_path(&path);
        if tokio::fs::try_exists(&temp).await? {
            warn!(path = %temp.display(), "Removing leftover compaction file");
            tokio::fs::remove_file(&temp).await?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        let file_len = file.metadata().await?.len();
        let header = if file_len == 0 {
            HeaderCheck::Incomplete
        } else {
            file.seek(SeekFrom::Start(0)).await?;
            read_header(&mut file, magic, &path).await?
        };

        if header == HeaderCheck::Incomplete {
            if file_len > 0 {
                warn!(path = %path.display(), len = file_len, "Torn header, reinitializing log");
            }
            file.set_len(0).await?;
            file.seek(SeekFrom::Start(0)).await?;
            file.write_all(&encode_header(magic)).await?;
            file.flush().await?;
            file.sync_all().await?;
            sync_parent_dir(&path).await?;
        }

        let (end, records) = scan(&path, magic, validate).await?;
        let file_len = file.metadata().await?.len();
        if end < file_len {
            warn!(
                path = %path.display(),
                valid_bytes = end,
                discarded_bytes = file_len - end,
                "Truncating torn tail"
            );
            file.set_len(end).await?;
            file.sync_all().await?;
        }
        file.seek(SeekFrom::Start(end)).await?;

        info!(path = %path.display(), records, bytes = end, "Opened log");

        Ok(Self {
            path,
            magic,
            sync_on_write,
            validate,
            file,
            end,
            records,
            needs_repair: false,
            needs_reopen: false,
            #[cfg(any(test, feature = "failpoints"))]
            failpoint: None,
            #[cfg(any(test, feature = "failpoints"))]
            fail_rollback: false,
            _marker: PhantomData,
        })
    }

    /// Append a record and force it to stable storage
    pub(crate) async fn append(&mut self, record: &T) -> Result<LogOffset, StorageError> {
        self.ensure_writable().await?;

        let frame = encode_frame(record)?;
        let offset = self.end;

        if let Err(e) = self.write_frame(&frame).await {
            warn!(path = %self.path.display(), offset, error = %e, "Append failed, rolling back");
            if let Err(rollback) = self.rollback(offset).await {
                warn!(error = %rollback, "Rollback failed, log needs repair");
                self.needs_repair = true;
            }
            return Err(e);
        }

        self.end += frame.len() as u64;
        self.records += 1;
        Ok(LogOffset(offset))
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), StorageError> {
        #[cfg(any(test, feature = "failpoints"))]
        if let Some((kind, unrolled)) = match self.failpoint {
            Some(FailPoint::TornWrite(kind)) => Some((kind, false)),
            Some(FailPoint::TornWriteUnrolled(kind)) => Some((kind, true)),
            _ => None,
        } {
            self.failpoint = None;
            self.fail_rollback = unrolled;
            self.file.write_all(&frame[..frame.len() / 2]).await?;
            self.file.flush().await?;
            return Err(std::io::Error::from(kind).into());
        }

        self.file.write_all(frame).await?;
        self.file.flush().await?;
        if self.sync_on_write {
            self.file.sync_data().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self, offset: u64) -> Result<(), StorageError> {
        #[cfg(any(test, feature = "failpoints"))]
        if std::mem::take(&mut self.fail_rollback) {
            return Err(std::io::Error::other("injected rollback failure").into());
        }

        self.file.set_len(offset).await?;
        self.file.seek(SeekFrom::Start(offset)).await?;
        Ok(())
    }

    async fn repair(&mut self) -> Result<(), StorageError> {
        let end = self.end;
        self.rollback(end).await.map_err(|e| {
            StorageError::LogUnavailable(format!("{} awaiting repair: {}", self.path.display(), e))
        })?;
        self.needs_repair = false;
        debug!(path = %self.path.display(), end, "Repaired log after failed append");
        Ok(())
    }

    /// Point the write handle at the live file again after a rewrite
    async fn reopen(&mut self) -> Result<(), StorageError> {
        let (end, records) = scan(&self.path, self.magic, self.validate).await?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .await?;
        file.seek(SeekFrom::Start(end)).await?;
        self.file = file;
        self.end = end;
        self.records = records;
        self.needs_reopen = false;
        self.needs_repair = false;
        Ok(())
    }

    /// Finish any reopen or repair left over from an earlier failure
    ///
    /// Writes never go through a handle to a file that was renamed over.
    async fn ensure_writable(&mut self) -> Result<(), StorageError> {
        if self.needs_reopen {
            self.reopen().await.map_err(|e| {
                StorageError::LogUnavailable(format!(
                    "{} could not be reopened after compaction: {}",
                    self.path.display(),
                    e
                ))
            })?;
            debug!(path = %self.path.display(), end = self.end, "Reopened log after compaction");
        }
        if self.needs_repair {
            self.repair().await?;
        }
        Ok(())
    }

    /// Lazily replay every valid record from the start of the log
    ///
    /// Each call opens its own read handle, so replay can be repeated. A torn
    /// or invalid frame ends the stream.
    pub(crate) fn replay(&self) -> impl Stream<Item = Result<LogEntry<T>, StorageError>> + Send + 'static {
        replay_path(self.path.clone(), self.magic, self.validate)
    }

    /// Rewrite the log keeping only records that satisfy `retain`
    ///
    /// The new log is written to a sibling temp file, synced, and renamed over
    /// the live file, so a crash leaves either the old or the new log intact.
    pub(crate) async fn rewrite<F>(&mut self, mut retain: F) -> Result<CompactionResult, StorageError>
    where
        F: FnMut(&T) -> bool,
    {
        self.ensure_writable().await?;
        let temp = temp_path(&self.path);
        let bytes_before = self.end;

        let outcome = async {
            let mut out = File::create(&temp).await?;
            out.write_all(&encode_header(self.magic)).await?;

            let mut retained = 0u64;
            let mut dropped = 0u64;
            let mut written = HEADER_LEN;
            let mut entries = std::pin::pin!(self.replay());
            while let Some(entry) = entries.try_next().await? {
                if retain(&entry.record) {
                    let frame = encode_frame(&entry.record)?;
                    out.write_all(&frame).await?;
                    written += frame.len() as u64;
                    retained += 1;
                } else {
                    dropped += 1;
                }
            }

            out.flush().await?;
            out.sync_all().await?;
            Ok::<_, StorageError>((retained, dropped, written))
        }
        .await;

        let (retained, dropped, written) = match outcome {
            Ok(counts) => counts,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&temp, &self.path).await?;
        // `self.file` now refers to the unlinked old log
        self.needs_reopen = true;

        #[cfg(any(test, feature = "failpoints"))]
        if let Some(FailPoint::AfterRename(kind)) = self
            .failpoint
            .take_if(|f| matches!(f, FailPoint::AfterRename(_)))
        {
            return Err(std::io::Error::from(kind).into());
        }

        sync_parent_dir(&self.path).await?;
        self.reopen().await?;

        info!(
            path = %self.path.display(),
            retained,
            dropped,
            bytes_before,
            bytes_after = written,
            "Rewrote log"
        );

        Ok(CompactionResult::new(retained, dropped, bytes_before, written))
    }

    /// Flush and sync everything written so far
    pub(crate) async fn sync(&mut self) -> Result<(), StorageError> {
        self.ensure_writable().await?;
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }

    /// Arm a fault for the next matching operation
    #[cfg(any(test, feature = "failpoints"))]
    pub(crate) fn inject_failure(&mut self, failpoint: FailPoint) {
        self.failpoint = Some(failpoint);
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn len_bytes(&self) -> u64 {
        self.end
    }

    pub(crate) fn record_count(&self) -> u64 {
        self.records
    }
}

enum ReplayState {
    Pending(PathBuf),
    Reading {
        reader: BufReader<File>,
        offset: u64,
    },
}

fn replay_path<T>(
    path: PathBuf,
    magic: Magic,
    validate: Validator<T>,
) -> impl Stream<Item = Result<LogEntry<T>, StorageError>> + Send + 'static
where
    T: DeserializeOwned + Send + 'static,
{
    futures::stream::try_unfold(ReplayState::Pending(path), move |state| {
        replay_step(state, magic, validate)
    })
}

async fn replay_step<T>(
    state: ReplayState,
    magic: Magic,
    validate: Validator<T>,
) -> Result<Option<(LogEntry<T>, ReplayState)>, StorageError>
where
    T: DeserializeOwned,
{
    let (mut reader, offset) = match state {
        ReplayState::Pending(path) => {
            let file = File::open(&path).await?;
            let mut reader = BufReader::new(file);
            if read_header(&mut reader, magic, &path).await? == HeaderCheck::Incomplete {
                return Ok(None);
            }
            (reader, HEADER_LEN)
        }
        ReplayState::Reading { reader, offset } => (reader, offset),
    };

    match read_frame::<_, T>(&mut reader).await? {
        FrameRead::Record { record, frame_len } => {
            if let Err(reason) = validate(&record) {
                warn!(offset, reason = %reason, "Invalid record, stopping replay");
                return Ok(None);
            }
            let entry = LogEntry {
                offset: LogOffset(offset),
                frame_len,
                record,
            };
            let next = ReplayState::Reading {
                reader,
                offset: offset + frame_len,
            };
            Ok(Some((entry, next)))
        }
        FrameRead::End => Ok(None),
        FrameRead::Torn { reason } | FrameRead::Damaged { reason, .. } => {
            warn!(offset, reason = %reason, "Unreadable record, stopping replay");
            Ok(None)
        }
    }
}

/// Find the end of the valid prefix and the number of records in it
///
/// A bad frame whose declared extent reaches the end of the file, or that is
/// followed only by zeros, is a torn tail and marks the end of the log. A bad
/// frame with data after it is reported as corruption so that the complete
/// records behind it are never truncated away.
async fn scan<T>(path: &Path, magic: Magic, validate: Validator<T>) -> Result<(u64, u64), StorageError>
where
    T: DeserializeOwned,
{
    let file = File::open(path).await?;
    let file_len = file.metadata().await?.len();
    let mut reader = BufReader::new(file);
    if read_header(&mut reader, magic, path).await? == HeaderCheck::Incomplete {
        return Ok((HEADER_LEN, 0));
    }

    let mut end = HEADER_LEN;
    let mut records = 0u64;
    loop {
        let (reason, declared_len) = match read_frame::<_, T>(&mut reader).await? {
            FrameRead::Record { record, frame_len } => match validate(&record) {
                Ok(()) => {
                    end += frame_len;
                    records += 1;
                    continue;
                }
                Err(reason) => (reason, frame_len),
            },
            FrameRead::End | FrameRead::Torn { .. } => return Ok((end, records)),
            FrameRead::Damaged {
                reason,
                declared_len,
            } => (reason, declared_len),
        };

        let damaged_end = end.saturating_add(declared_len);
        if damaged_end >= file_len || zeros_to_eof(path, end).await? {
            debug!(offset = end, reason = %reason, "Log ends in a damaged record");
            return Ok((end, records));
        }

        return Err(StorageError::corrupt(
            path,
            format!(
                "damaged record at byte {} followed by {} more bytes: {}",
                end,
                file_len - damaged_end,
                reason
            ),
        ));
    }
}

/// Whether every byte from `offset` to the end of the file is zero
async fn zeros_to_eof(path: &Path, offset: u64) -> Result<bool, StorageError> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(true);
        }
        if buf[..read].iter().any(|&b| b != 0) {
            return Ok(false);
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".compact.tmp");
    path.with_file_name(name)
}

/// Make a rename or file creation durable by syncing the parent directory
#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> Result<(), StorageError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}
