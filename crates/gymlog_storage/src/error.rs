//! Storage errors.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`crate::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The operating system reported an error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read reached past the last written byte.
    #[error("read past end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Size at the time of the read.
        size: u64,
    },

    /// A truncation asked to grow the store.
    #[error("cannot truncate {size} bytes of storage to {requested}")]
    InvalidTruncate {
        /// Requested size.
        requested: u64,
        /// Current size.
        size: u64,
    },

    /// The stored bytes cannot be interpreted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}
