//! The backend trait.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// # Invariants
///
/// - `append` returns the offset the bytes were written at, which is the
///   size of the store before the call
/// - `read_at` returns exactly the bytes previously appended there
/// - after `sync` returns, everything appended so far survives a crash
/// - implementations are `Send + Sync` so a store can be shared
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the store, or on I/O failure.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    fn flush(&mut self) -> StorageResult<()>;

    /// Makes all appended data and metadata durable.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    fn sync(&mut self) -> StorageResult<()>;

    /// Current size in bytes; the offset of the next append.
    ///
    /// # Errors
    ///
    /// Fails if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Drops every byte at or after `new_size`.
    ///
    /// Used to cut off a torn tail record during recovery and to reset a
    /// store before it is rewritten.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::InvalidTruncate`] if `new_size`
    /// exceeds the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Reads the whole store.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, size as usize)
    }
}
