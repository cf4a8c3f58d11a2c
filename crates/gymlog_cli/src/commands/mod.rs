//! CLI command implementations.

pub mod checkpoint;
pub mod dump;
pub mod inspect;
pub mod staged;
