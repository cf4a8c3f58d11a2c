//! Error types for the key-value engine.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the key-value engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] gymlog_storage::StorageError),

    /// I/O error outside the storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// What went wrong.
        message: String,
    },

    /// The journal holds bytes that are not a valid record.
    #[error("journal corruption at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the bad record.
        offset: u64,
        /// What was wrong with it.
        message: String,
    },

    /// A journal record failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the bad record.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed from its bytes.
        actual: u32,
    },

    /// The table is not part of the schema.
    #[error("unknown table: {name}")]
    UnknownTable {
        /// Table name.
        name: String,
    },

    /// The index is not declared on the table.
    #[error("unknown index {index} on table {table}")]
    UnknownIndex {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },

    /// Another process holds the database directory.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database was closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// The operation is not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why it was rejected.
        message: String,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an unknown table error.
    pub fn unknown_table(name: impl Into<String>) -> Self {
        Self::UnknownTable { name: name.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the error means the on-disk journal cannot be trusted.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::LogCorruption { .. } | Self::ChecksumMismatch { .. }
        )
    }
}
