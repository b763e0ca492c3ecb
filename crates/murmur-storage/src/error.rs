//! Error types for murmur-storage
//!
//! I/O failures keep their [`std::io::ErrorKind`] so callers can tell a full
//! disk (worth retrying later) from a bad path (never going to work).

use std::io;

use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error ({kind}): {message}")]
    Io { kind: io::ErrorKind, message: String },

    /// Log file header is not a murmur log of the expected type
    #[error("Corrupt log {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Log file was written by an incompatible format version
    #[error("Unsupported log format version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    /// Record exceeds the size a frame can carry or a field limit
    #[error("Record too large: {len} bytes (limit {max})")]
    RecordTooLarge { len: usize, max: usize },

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The log refuses writes until a failed rollback or reopen succeeds
    #[error("Log unavailable: {0}")]
    LogUnavailable(String),
}

/// Whether retrying an operation might succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Resource pressure or interruption; a later retry may succeed
    Transient,
    /// Misconfiguration or damaged data; retrying will not help
    Structural,
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl StorageError {
    /// Create a new Corrupt error
    pub fn corrupt(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Classify the error for retry decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::Io { kind, .. } => match kind {
                io::ErrorKind::StorageFull
                | io::ErrorKind::Interrupted
                | io::ErrorKind::WouldBlock
                | io::ErrorKind::TimedOut
                | io::ErrorKind::OutOfMemory
                | io::ErrorKind::ResourceBusy => ErrorClass::Transient,
                _ => ErrorClass::Structural,
            },
            StorageError::Corrupt { .. }
            | StorageError::LogUnavailable(_)
            | StorageError::UnsupportedVersion { .. }
            | StorageError::RecordTooLarge { .. }
            | StorageError::Serialization(_) => ErrorClass::Structural,
        }
    }

    /// Shorthand for `class() == ErrorClass::Transient`
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}
