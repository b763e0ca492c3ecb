//! Human-readable transcript lines
//!
//! Collaborators render history as
//!
//! ```text
//! [2024-05-01 09:30:00] alice (ID: 1): hello
//! [2024-05-01 09:31:12] bob (ID: 2) (inactive): bye
//! [2024-05-01 09:32:40] unknown (ID: 7): orphaned
//! ```

use std::fmt;

use murmur_core::{Message, Sender, SenderId, Timestamp};

/// A message joined with what the directory knows about its sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub timestamp: Timestamp,
    pub sender_id: SenderId,
    /// `None` when the sender is missing from the directory
    pub sender_name: Option<String>,
    pub sender_active: bool,
    pub body: String,
}

impl TranscriptLine {
    pub fn new(message: &Message, sender: Option<&Sender>) -> Self {
        Self {
            timestamp: message.timestamp,
            sender_id: message.sender_id,
            sender_name: sender.map(|s| s.display_name.clone()),
            sender_active: sender.is_some_and(|s| s.active),
            body: message.body.clone(),
        }
    }

    /// Display name, or `unknown` for senders the directory never saw
    pub fn name(&self) -> &str {
        self.sender_name.as_deref().unwrap_or("unknown")
    }
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (ID: {})", self.timestamp, self.name(), self.sender_id)?;
        if self.sender_name.is_some() && !self.sender_active {
            write!(f, " (inactive)")?;
        }
        write!(f, ": {}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-05-01 09:30:00 UTC
    const MAY_FIRST: i64 = 1_714_555_800_000_000;

    fn message(sender: u64, body: &str) -> Message {
        Message::new(SenderId(sender), Timestamp::from_micros(MAY_FIRST), body)
    }

    #[test]
    fn test_active_sender() {
        let alice = Sender::new(SenderId(1), "alice", Timestamp::EPOCH);
        let line = TranscriptLine::new(&message(1, "hello"), Some(&alice));
        assert_eq!(line.to_string(), "[2024-05-01 09:30:00] alice (ID: 1): hello");
    }

    #[test]
    fn test_inactive_sender() {
        let mut bob = Sender::new(SenderId(2), "bob", Timestamp::EPOCH);
        bob.active = false;
        let line = TranscriptLine::new(&message(2, "bye"), Some(&bob));
        assert_eq!(
            line.to_string(),
            "[2024-05-01 09:30:00] bob (ID: 2) (inactive): bye"
        );
    }

    #[test]
    fn test_unknown_sender() {
        let line = TranscriptLine::new(&message(7, "orphaned"), None);
        assert_eq!(line.name(), "unknown");
        assert_eq!(
            line.to_string(),
            "[2024-05-01 09:30:00] unknown (ID: 7): orphaned"
        );
    }
}
