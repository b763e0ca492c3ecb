//! Output layers for the murmur subscriber
//!
//! Every output is a boxed [`Layer`] over the bare [`Registry`] so the
//! builder can assemble any combination at runtime.

use std::fs::{self, File};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{Layer, Registry};

use crate::config::{ConsoleConfig, FileConfig, JsonlConfig, RotationStrategy};
use crate::error::LoggingError;

/// A type-erased output layer
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Console layer writing to stderr
///
/// Stdout belongs to the application, so logs never go there.
pub fn console_layer(console: &ConsoleConfig, jsonl: &JsonlConfig) -> BoxedLayer {
    if console.pretty {
        tracing_subscriber::fmt::layer()
            .with_ansi(console.ansi)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        jsonl_layer(std::io::stderr, jsonl)
    }
}

/// JSONL formatting layer for any writer
pub fn jsonl_layer<W>(writer: W, jsonl: &JsonlConfig) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(jsonl.include_current_span)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_thread_ids(jsonl.include_thread_info)
        .with_thread_names(jsonl.include_thread_info)
        .with_ansi(false)
        .with_writer(writer)
        .boxed()
}

/// Open the non-blocking writer for file output
///
/// [`RotationStrategy::Never`] truncates a single `<prefix>.log`; the
/// rotating strategies append to dated files.
pub fn file_writer(file: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file.directory).map_err(|source| LoggingError::Io {
        path: file.directory.clone(),
        source,
    })?;

    let rotation = match file.rotation {
        RotationStrategy::Never => {
            let path = file.directory.join(format!("{}.log", file.prefix));
            let handle = File::create(&path).map_err(|source| LoggingError::Io { path, source })?;
            return Ok(tracing_appender::non_blocking(handle));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file.prefix.clone())
        .filename_suffix("log");
    if let Some(max) = file.max_files {
        builder = builder.max_log_files(max);
    }
    let appender = builder
        .build(&file.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}
