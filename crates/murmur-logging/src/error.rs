//! Logging setup errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot prepare log output at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create rolling log appender: {0}")]
    Appender(String),

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}
