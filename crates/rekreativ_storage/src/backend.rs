//! The backend contract.

use crate::error::StorageResult;

/// An append-only byte store with random reads.
///
/// # Invariants
///
/// - `append` returns the offset of the first byte it wrote
/// - `read_at` returns exactly the bytes previously appended at that range
/// - after `flush` returns, appended bytes survive a process exit
/// - `truncate` only ever shrinks; it is how a torn tail is cut away
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the stored bytes.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes appended bytes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Pushes appended bytes and metadata all the way to the device.
    fn sync(&mut self) -> StorageResult<()>;

    /// Current length in bytes (the offset of the next append).
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the store down to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::TruncateBeyondEnd`] when
    /// `new_size` is larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
