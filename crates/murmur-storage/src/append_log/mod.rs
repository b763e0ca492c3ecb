//! Append-only log storage
//!
//! This module provides immutable, append-only logs. Records are written
//! sequentially, forced to stable storage, and can only be appended, never
//! modified in place.
//!
//! ## Features
//!
//! - Sequential fsync'd appends
//! - Lazy, restartable replay from the start of the log
//! - Torn-tail detection and repair after a crash
//! - Crash-atomic compaction (temp file, fsync, rename)
//!
//! ## Storage Format
//!
//! Each log file contains a versioned header and checksummed,
//! length-prefixed, postcard-serialized records:
//! ```text
//! [8 bytes: header][4 bytes: len][len bytes: record][8 bytes: checksum][4 bytes: len][...]
//! ```

mod compaction;
pub mod frame;
mod framed_log;
pub mod message_log;

pub(crate) use framed_log::FramedLog;

pub use compaction::CompactionResult;
#[cfg(any(test, feature = "failpoints"))]
pub use framed_log::FailPoint;
pub use framed_log::{LogEntry, LogOffset};
pub use message_log::{MessageLog, MessageLogConfig};
