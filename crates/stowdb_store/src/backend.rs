//! Byte-level backend trait for the commit log.

use crate::error::StoreResult;

/// An append-only byte store that holds the commit log.
///
/// Backends never interpret the bytes they hold. The record store frames
/// each committed transaction as one batch and appends it here; on open the
/// whole log is read back and replayed.
///
/// # Invariants
///
/// - `append` returns the offset where the bytes were written
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `sync` returns, every appended byte survives process exit
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends past the current size or an
    /// I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>>;

    /// Appends bytes to the end of the log and returns their offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Returns the current size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StoreResult<u64>;

    /// Makes all appended bytes durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StoreResult<()>;

    /// Discards everything after `new_size`.
    ///
    /// Used by recovery to drop a torn tail batch.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is larger than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StoreResult<()>;
}

/// Reads the entire contents of a backend.
pub(crate) fn read_all(backend: &dyn StorageBackend) -> StoreResult<Vec<u8>> {
    let size = backend.size()?;
    let len = usize::try_from(size)
        .map_err(|_| crate::StoreError::Corrupted(format!("log too large: {size} bytes")))?;
    backend.read_at(0, len)
}
