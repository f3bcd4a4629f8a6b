//! Store statistics.

use serde::Serialize;

/// Snapshot of store size and log health, from [`crate::Store::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Live documents.
    pub documents: u64,
    /// Records in the document log.
    pub log_records: u64,
    /// Records that no longer describe a live document.
    pub dead_records: u64,
    /// Size of the document log in bytes.
    pub log_bytes: u64,
    /// Sequence of the last committed write.
    pub last_sequence: u64,
    /// Compactions run since the store was opened.
    pub compactions: u64,
}

impl StoreStats {
    /// Whether automatic compaction should run for the given policy.
    ///
    /// A `ratio` of zero disables it.
    #[must_use]
    pub fn wants_compaction(&self, ratio: u32, min_records: u64) -> bool {
        ratio > 0
            && self.log_records >= min_records
            && self.dead_records > self.documents.saturating_mul(u64::from(ratio))
    }
}

/// Outcome of a compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompactionStats {
    /// Log records before.
    pub records_before: u64,
    /// Log records after.
    pub records_after: u64,
    /// Log bytes before.
    pub bytes_before: u64,
    /// Log bytes after.
    pub bytes_after: u64,
}

impl CompactionStats {
    /// Bytes reclaimed.
    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}
