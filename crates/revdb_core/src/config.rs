//! Store configuration.

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the store already exists.
    pub error_if_exists: bool,

    /// Whether every write is synced to disk before it is acknowledged.
    /// When false, writes are only flushed to the OS.
    pub sync_on_write: bool,

    /// Reject a `_rev` supplied when creating a document.
    pub strict_create: bool,

    /// Number of change events kept for [`crate::Store::changes_since`].
    pub change_history: usize,

    /// Compact automatically once dead log records exceed
    /// `compact_ratio` times the live document count (0 = never).
    pub compact_ratio: u32,

    /// Minimum log length before automatic compaction is considered.
    pub compact_min_records: u64,

    /// Number of stripes in the per-document lock table.
    pub lock_stripes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_write: true,
            strict_create: false,
            change_history: 10_000,
            compact_ratio: 4,
            compact_min_records: 1024,
            lock_stripes: 64,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the store exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to sync the log on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets strict creation mode.
    #[must_use]
    pub const fn strict_create(mut self, value: bool) -> Self {
        self.strict_create = value;
        self
    }

    /// Sets the change history length.
    #[must_use]
    pub const fn change_history(mut self, events: usize) -> Self {
        self.change_history = events;
        self
    }

    /// Sets the automatic compaction ratio (0 disables).
    #[must_use]
    pub const fn compact_ratio(mut self, ratio: u32) -> Self {
        self.compact_ratio = ratio;
        self
    }

    /// Sets the minimum log length for automatic compaction.
    #[must_use]
    pub const fn compact_min_records(mut self, records: u64) -> Self {
        self.compact_min_records = records;
        self
    }

    /// Sets the number of lock stripes (at least one is always used).
    #[must_use]
    pub const fn lock_stripes(mut self, stripes: usize) -> Self {
        self.lock_stripes = stripes;
        self
    }
}
