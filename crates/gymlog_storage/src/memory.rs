//! In-memory backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// A backend that keeps its bytes on the heap.
///
/// Handles made with [`InMemoryBackend::shared`] point at the same buffer,
/// which lets a test drop a store and reopen it over the bytes it wrote, the
/// way a process restart would see a file.
///
/// ```rust
/// use gymlog_storage::{InMemoryBackend, StorageBackend};
///
/// let mut first = InMemoryBackend::new();
/// let second = first.shared();
/// first.append(b"abc").unwrap();
/// assert_eq!(second.size().unwrap(), 3);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns another handle over the same buffer.
    #[must_use]
    pub fn shared(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }

    /// Returns a copy of the current contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = usize::try_from(offset).map_err(|_| StorageError::ReadPastEnd {
            offset,
            len,
            size,
        })?;
        match start.checked_add(len) {
            Some(end) if end <= data.len() => Ok(data[start..end].to_vec()),
            _ => Err(StorageError::ReadPastEnd { offset, len, size }),
        }
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size,
            });
        }
        // new_size <= len, so the cast is lossless
        data.truncate(new_size as usize);
        Ok(())
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        data.clear();
        data.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_report_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"squat").unwrap(), 0);
        assert_eq!(backend.append(b"bench").unwrap(), 5);
        assert_eq!(backend.size().unwrap(), 10);
        assert_eq!(backend.read_at(5, 5).unwrap(), b"bench");
    }

    #[test]
    fn reads_past_end_fail() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"row").unwrap();
        assert!(matches!(
            backend.read_at(1, 5),
            Err(StorageError::ReadPastEnd { size: 3, .. })
        ));
        assert!(matches!(
            backend.read_at(u64::MAX, 1),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(backend.read_at(3, 0).unwrap().is_empty());
    }

    #[test]
    fn truncate_cuts_tail_but_never_grows() {
        let mut backend = InMemoryBackend::with_data(b"deadlift".to_vec());
        backend.truncate(4).unwrap();
        assert_eq!(backend.data(), b"dead");
        assert!(matches!(
            backend.truncate(9),
            Err(StorageError::InvalidTruncate { requested: 9, size: 4 })
        ));
    }

    #[test]
    fn replace_swaps_contents() {
        let mut backend = InMemoryBackend::with_data(b"old journal".to_vec());
        backend.replace(b"new").unwrap();
        assert_eq!(backend.read_all().unwrap(), b"new");
    }

    #[test]
    fn shared_handles_see_each_other() {
        let mut writer = InMemoryBackend::new();
        let reader = writer.shared();
        writer.append(b"row").unwrap();
        writer.replace(b"compacted").unwrap();
        assert_eq!(reader.data(), b"compacted");
    }
}
