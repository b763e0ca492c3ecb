//! Messages and timestamps

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::SenderId;

/// Wall-clock instant with microsecond resolution
///
/// Stored as microseconds since the Unix epoch so that a log can hand out
/// strictly increasing values even for messages sent within one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The Unix epoch
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Create a timestamp from microseconds since the Unix epoch
    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Create a timestamp from a UTC datetime
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.timestamp_micros())
    }

    /// Microseconds since the Unix epoch
    pub fn as_micros(&self) -> i64 {
        self.0
    }

    /// Whole seconds since the Unix epoch
    pub fn as_secs(&self) -> i64 {
        self.0.div_euclid(1_000_000)
    }

    /// Convert to a UTC datetime
    ///
    /// Values outside chrono's range clamp to the epoch.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_micros(self.0).unwrap_or_default()
    }

    /// The smallest timestamp strictly after this one
    pub fn successor(&self) -> Timestamp {
        Timestamp(self.0.saturating_add(1))
    }

    /// Pick the timestamp for a new entry given the previous one
    ///
    /// Returns `now` unless that would not be strictly after `previous`.
    pub fn monotonic(now: Timestamp, previous: Option<Timestamp>) -> Timestamp {
        match previous {
            Some(prev) if now <= prev => prev.successor(),
            _ => now,
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::from_datetime(datetime)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// An immutable chat message
///
/// Field order matches the on-disk record layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message
    pub sender_id: SenderId,
    /// When the message was appended
    pub timestamp: Timestamp,
    /// Message text (at most [`crate::MAX_BODY_LEN`] bytes)
    pub body: String,
}

impl Message {
    /// Create a new message
    pub fn new(sender_id: SenderId, timestamp: Timestamp, body: impl Into<String>) -> Self {
        Self {
            sender_id,
            timestamp,
            body: body.into(),
        }
    }
}
