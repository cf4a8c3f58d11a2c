//! Replica errors.

use gymlog_core::CoreError;
use gymlog_model::ModelError;
use thiserror::Error;

/// Result type for replica operations.
pub type ReplicaResult<T> = Result<T, ReplicaError>;

/// Errors raised by the local replica.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// The underlying engine failed.
    #[error("storage error: {0}")]
    Core(#[from] CoreError),

    /// A value or key failed validation.
    #[error("invalid data: {0}")]
    Model(#[from] ModelError),
}

impl ReplicaError {
    /// Returns true if the store on disk cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_corruption())
    }
}
