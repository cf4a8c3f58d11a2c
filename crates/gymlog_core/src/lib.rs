//! # gymlog core
//!
//! The embedded ordered key-value engine underneath the gymlog local store.
//!
//! - Named tables declared up front in a [`Schema`], each mapping string keys
//!   to opaque bytes, kept in key order
//! - Secondary indexes computed from stored bytes by an [`IndexDef`] extractor
//! - Snapshot-isolated [`ReadTransaction`]s
//! - A single serializable [`WriteTransaction`] at a time, committed or
//!   aborted explicitly
//! - Durability through a CRC-framed write-ahead journal replayed on open,
//!   compacted by [`Database::checkpoint`]
//!
//! ## Example
//!
//! ```rust
//! use gymlog_core::{Database, Schema, TableDef, TableReader};
//!
//! let schema = Schema::new().with_table(TableDef::new("workout"));
//! let db = Database::open_in_memory(schema).unwrap();
//!
//! db.transaction(|txn| txn.put("workout", "w1", b"leg day".to_vec())).unwrap();
//!
//! let snapshot = db.read().unwrap();
//! assert_eq!(snapshot.get("workout", "w1").unwrap().as_deref(), Some(&b"leg day"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod database;
mod dir;
mod error;
mod schema;
mod snapshot;
mod stats;
mod transaction;
mod types;
pub mod wal;

pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use schema::{IndexDef, IndexExtractor, Schema, TableDef};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use transaction::{prefix_upper_bound, ReadTransaction, TableReader, WriteTransaction};
pub use types::{SequenceNumber, TransactionId};
