//! # Murmur Core
//!
//! Core types, limits, and errors shared by every murmur crate.
//!
//! ## Key Types
//!
//! - [`SenderId`] / [`Sender`]: registered participants of a room
//! - [`Message`]: an immutable chat message as stored in the log
//! - [`Timestamp`]: microsecond wall-clock instant attached to each message
//! - [`Clock`]: time abstraction for testability
//!
//! ## Limits
//!
//! Bodies and display names are measured in bytes and are never truncated.
//! Use [`validate_body`] and [`validate_display_name`] before accepting
//! input from a collaborator.

pub mod error;
pub mod identity;
pub mod limits;
pub mod message;
pub mod traits;

// Re-export main types
pub use error::*;
pub use identity::*;
pub use limits::*;
pub use message::*;
pub use traits::*;
