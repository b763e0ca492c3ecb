//! # Murmur Storage
//!
//! Storage building blocks for the murmur message log.
//!
//! ## Features
//!
//! - **RingStore**: fixed-capacity FIFO view with oldest-first eviction
//! - **MessageLog**: append-only, fsync'd, crash-safe message log with lazy replay
//! - **SessionDirectory**: bounded registry of senders
//! - **DirectoryJournal**: durable record of directory changes
//!
//! ## Example
//!
//! ```rust,ignore
//! use futures::TryStreamExt;
//! use murmur_core::{Message, SenderId, Timestamp};
//! use murmur_storage::{MessageLog, MessageLogConfig, RingStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut log = MessageLog::open(MessageLogConfig::new("./data/messages.log"))
//!         .await
//!         .unwrap();
//!
//!     let msg = Message::new(SenderId(1), Timestamp::from_micros(1), "hi");
//!     log.append(&msg).await.unwrap();
//!
//!     // Rebuild the hot view from disk
//!     let mut ring = RingStore::new(100);
//!     let messages: Vec<Message> = log.replay().try_collect().await.unwrap();
//!     for msg in messages {
//!         ring.insert(msg);
//!     }
//!     assert_eq!(ring.len(), 1);
//! }
//! ```

pub mod append_log;
pub mod directory;
pub mod error;
pub mod ring;

// Re-exports
pub use append_log::{CompactionResult, LogEntry, LogOffset, MessageLog, MessageLogConfig};
#[cfg(any(test, feature = "failpoints"))]
pub use append_log::FailPoint;
pub use directory::{DirectoryEvent, DirectoryJournal, RegisterError, SessionDirectory};
pub use error::{ErrorClass, StorageError};
pub use ring::RingStore;
