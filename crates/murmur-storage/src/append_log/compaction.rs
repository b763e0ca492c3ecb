//! Log compaction results
//!
//! Compaction rewrites a log keeping only the records a caller chooses to
//! retain. It is never part of the append hot path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a compaction operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionResult {
    /// Records copied into the new log
    pub records_retained: u64,
    /// Records left behind
    pub records_dropped: u64,
    /// Log size before compaction, including the header
    pub bytes_before: u64,
    /// Log size after compaction, including the header
    pub bytes_after: u64,
    /// Timestamp of compaction
    pub compacted_at: DateTime<Utc>,
}

impl CompactionResult {
    /// Create a new compaction result
    pub fn new(records_retained: u64, records_dropped: u64, bytes_before: u64, bytes_after: u64) -> Self {
        Self {
            records_retained,
            records_dropped,
            bytes_before,
            bytes_after,
            compacted_at: Utc::now(),
        }
    }

    /// Bytes reclaimed by the rewrite
    pub fn bytes_freed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}
