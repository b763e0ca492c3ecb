//! # Murmur Room
//!
//! A durable, bounded chat-room message log.
//!
//! [`RoomLog`] ties together:
//! - a durable, append-only message log (every accepted message survives a
//!   crash)
//! - a fixed-capacity ring of the most recent messages (what readers see)
//! - a bounded sender directory, journaled so ids survive restarts
//!
//! ## Example
//!
//! ```rust,ignore
//! use murmur_room::{RoomConfig, RoomLog};
//!
//! let room = RoomLog::new(RoomConfig::with_data_dir("./my-room"))?;
//! room.recover().await?;
//!
//! let alice = room.register("alice").await?;
//! room.append(alice, "hi").await?;
//!
//! for line in room.transcript_tail(10) {
//!     println!("{}", line);
//! }
//! ```

mod config;
mod error;
mod room;
mod transcript;

pub use config::RoomConfig;
pub use error::{AppendError, ConfigError, DirectoryError, RoomError, RoomResult};
pub use room::{RecoveryReport, RoomLog, RoomState};
pub use transcript::TranscriptLine;

// Types that appear in the public API
pub use murmur_core::{CapacityError, Message, Sender, SenderId, Timestamp, ValidationError};
pub use murmur_storage::CompactionResult;
