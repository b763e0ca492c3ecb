//! Sender identities
//!
//! A [`Sender`] is created once at registration and never deleted. It can be
//! deactivated, which frees a directory slot but keeps the record so that
//! historical messages still resolve to a display name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::Timestamp;

/// Identifier assigned to a sender at registration
///
/// Ids start at 1 and are never reused within a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(pub u64);

impl SenderId {
    /// The first id handed out by an empty directory
    pub const FIRST: SenderId = SenderId(1);

    /// Create a sender id from its raw value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The id that follows this one
    pub fn next(&self) -> SenderId {
        SenderId(self.0.saturating_add(1))
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SenderId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A registered participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Unique id
    pub id: SenderId,
    /// Human-readable name (not required to be unique)
    pub display_name: String,
    /// When the sender was registered
    pub registered_at: Timestamp,
    /// Whether the sender may still append messages
    pub active: bool,
}

impl Sender {
    /// Create a new, active sender record
    pub fn new(id: SenderId, display_name: impl Into<String>, registered_at: Timestamp) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            registered_at,
            active: true,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ID: {})", self.display_name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_id_sequence() {
        assert_eq!(SenderId::FIRST.get(), 1);
        assert_eq!(SenderId::FIRST.next(), SenderId(2));
        assert_eq!(SenderId(u64::MAX).next(), SenderId(u64::MAX));
    }

    #[test]
    fn test_sender_display() {
        let sender = Sender::new(SenderId(3), "alice", Timestamp::from_micros(0));
        assert!(sender.active);
        assert_eq!(sender.to_string(), "alice (ID: 3)");
    }

    #[test]
    fn test_sender_id_is_transparent() {
        let bytes = postcard::to_allocvec(&SenderId(7)).unwrap();
        let raw = postcard::to_allocvec(&7u64).unwrap();
        assert_eq!(bytes, raw);
    }
}
