//! Error types shared across murmur crates

use thiserror::Error;

/// Input rejected before it reaches any store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message body is {len} bytes, limit is {max}")]
    BodyTooLong { len: usize, max: usize },

    #[error("Display name must not be empty")]
    EmptyName,

    #[error("Display name is {len} bytes, limit is {max}")]
    NameTooLong { len: usize, max: usize },
}

/// The session directory already holds its maximum number of active senders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Sender directory is full ({capacity} active senders)")]
pub struct CapacityError {
    pub capacity: usize,
}
