//! The storage backend trait.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// The journal appends framed records and reads them back on open. The only
/// non-append mutations are [`truncate`](Self::truncate), used to cut off a
/// torn tail after a crash, and [`replace`](Self::replace), used when the
/// journal is compacted.
///
/// # Invariants
///
/// - `append` returns the offset of the first written byte
/// - `read_at` returns exactly what was appended at that offset
/// - after `replace(data)` returns, readers observe either the old contents
///   or `data`, never a mix
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::ReadPastEnd`] if the range extends
    /// past the current size.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to stable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Discards everything after `new_size`.
    ///
    /// # Errors
    ///
    /// Fails if `new_size` is larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically swaps the whole contents for `data`.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Reads the entire contents.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            crate::StorageError::Corrupted(format!("store of {size} bytes does not fit in memory"))
        })?;
        self.read_at(0, len)
    }
}
