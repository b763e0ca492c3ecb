//! Structured logging for murmur
//!
//! Installs a global `tracing` subscriber with any combination of:
//!
//! - **JSONL console output** on stderr (default)
//! - **Human-readable console output** for interactive use
//! - **JSONL file output** with daily/hourly rotation via tracing-appender
//!
//! `RUST_LOG` always wins over the configured levels.
//!
//! # Quick Start
//!
//! ```ignore
//! use murmur_logging::{LogConfig, MurmurSubscriberBuilder};
//!
//! // JSONL to stderr
//! let _guard = MurmurSubscriberBuilder::new().init();
//!
//! // Pretty output while developing
//! let _guard = MurmurSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! Keep the returned guard alive for as long as file output should be
//! written; dropping it flushes pending lines.

pub mod config;
pub mod error;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, FilterConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use error::LoggingError;
pub use tracing_appender::non_blocking::WorkerGuard;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use layers::BoxedLayer;

/// Builder for configuring and installing the murmur subscriber
pub struct MurmurSubscriberBuilder {
    config: LogConfig,
}

impl MurmurSubscriberBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Switch the console between pretty and JSONL output
    pub fn with_pretty_console(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Install the subscriber globally
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber has already been set or the log file
    /// cannot be opened.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => panic!("failed to initialize logging: {}", e),
        }
    }

    /// Try to install the subscriber globally
    ///
    /// Returns the file writer guard when file output is configured.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.filter_directives()));

        let mut outputs: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            outputs.push(layers::console_layer(
                &self.config.console,
                &self.config.jsonl,
            ));
        }

        if let Some(file) = &self.config.file {
            let (writer, file_guard) = layers::file_writer(file)?;
            outputs.push(layers::jsonl_layer(writer, &self.config.jsonl));
            guard = Some(file_guard);
        }

        tracing_subscriber::registry()
            .with(outputs)
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }
}

impl Default for MurmurSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging with default settings (JSONL to stderr)
pub fn init_default() -> Option<WorkerGuard> {
    MurmurSubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    MurmurSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for tests, ignoring an already installed subscriber
pub fn init_testing() {
    let _ = MurmurSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = MurmurSubscriberBuilder::new();
        assert_eq!(builder.config.default_level, "info");
    }

    #[test]
    fn test_default_is_jsonl() {
        let builder = MurmurSubscriberBuilder::new();
        assert!(!builder.config.console.pretty);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = MurmurSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config.default_level, "debug");
        assert!(builder.config.console.pretty);
    }

    #[test]
    fn test_builder_overrides() {
        let builder = MurmurSubscriberBuilder::new()
            .with_level("trace")
            .with_console(false)
            .with_pretty_console(true)
            .with_file_output(FileConfig::default());
        assert_eq!(builder.config.default_level, "trace");
        assert!(!builder.config.console.enabled);
        assert!(builder.config.console.pretty);
        assert!(builder.config.file.is_some());
    }
}
