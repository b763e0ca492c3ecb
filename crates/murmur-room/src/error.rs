//! Error types for the room log

use std::path::PathBuf;

use murmur_core::{CapacityError, SenderId, ValidationError};
use murmur_storage::{ErrorClass, RegisterError, StorageError};
use thiserror::Error;

/// Invalid room configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Message capacity must be at least 1")]
    ZeroMessageCapacity,

    #[error("Sender capacity must be at least 1")]
    ZeroSenderCapacity,

    #[error("Message log and directory journal share one path: {0}")]
    SharedPath(PathBuf),
}

/// Errors from recovery and maintenance operations
#[derive(Debug, Error)]
pub enum RoomError {
    /// `recover` has not completed yet
    #[error("Room log is not ready; call recover first")]
    NotReady,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Why an append was refused
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("Room log is not ready; call recover first")]
    NotReady,

    /// The sender is unknown or no longer active
    #[error("Sender {0} is not registered")]
    UnknownSender(SenderId),

    #[error("Message body is {len} bytes, limit is {max}")]
    BodyTooLong { len: usize, max: usize },

    /// The durable write failed; the message was not stored anywhere
    #[error("Message could not be persisted: {0}")]
    PersistenceFailed(#[source] StorageError),
}

impl AppendError {
    /// Whether retrying the same append might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppendError::PersistenceFailed(e) => e.class() == ErrorClass::Transient,
            _ => false,
        }
    }
}

/// Errors from registering or deactivating senders
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Room log is not ready; call recover first")]
    NotReady,

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    InvalidName(#[from] ValidationError),

    #[error("Directory change could not be persisted: {0}")]
    PersistenceFailed(#[source] StorageError),
}

impl From<RegisterError> for DirectoryError {
    fn from(e: RegisterError) -> Self {
        match e {
            RegisterError::Capacity(e) => DirectoryError::Capacity(e),
            RegisterError::InvalidName(e) => DirectoryError::InvalidName(e),
        }
    }
}

/// Result type alias for room maintenance operations
pub type RoomResult<T> = Result<T, RoomError>;
