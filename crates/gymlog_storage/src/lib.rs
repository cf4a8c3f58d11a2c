//! # gymlog storage
//!
//! Byte-level storage for the gymlog journal.
//!
//! Backends hold one growing byte sequence. They never look inside it:
//! record framing, checksums and replay all live in `gymlog_core`.
//!
//! ## Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests
//! - [`FileBackend`] - a single file on disk
//!
//! ## Example
//!
//! ```rust
//! use gymlog_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let at = backend.append(b"leg day").unwrap();
//! assert_eq!(backend.read_at(at, 7).unwrap(), b"leg day");
//!
//! backend.replace(b"rest day").unwrap();
//! assert_eq!(backend.read_all().unwrap(), b"rest day");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
