//! Model validation errors.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// A value that does not satisfy the model's rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Not a `YYYY-MM-DD` calendar date.
    #[error("invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),

    /// An id of the wrong shape.
    #[error("invalid {kind} id {value:?}")]
    InvalidId {
        /// Kind of id expected.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// An unknown measurement or exercise type name.
    #[error("unknown {kind} type {value:?}")]
    UnknownType {
        /// Which type family.
        kind: &'static str,
        /// The rejected name.
        value: String,
    },

    /// Sets whose fields do not match the exercise type.
    #[error("{exercise_type} expects {expected} sets")]
    SetShapeMismatch {
        /// The exercise type.
        exercise_type: String,
        /// Set shape the type requires.
        expected: &'static str,
    },
}
