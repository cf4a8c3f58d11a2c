//! Write-ahead journal.
//!
//! Every commit is appended to the journal before its snapshot is published.
//! Opening a database replays the journal from the start.
//!
//! ## Record framing
//!
//! ```text
//! | magic "GLOG" (4) | version (2) | type (1) | length (4) | payload | crc32 (4) |
//! ```
//!
//! The CRC covers every byte before it. Integers are little-endian.
//!
//! ## Recovery
//!
//! - Only transactions with a `Commit` record are applied, in commit order.
//! - A record cut short at the end of the journal is a crash mid-append: the
//!   tail is dropped and the journal is truncated to the last whole record.
//! - A checksum mismatch, bad magic or unknown record type anywhere is fatal.
//!
//! ## Checkpoints
//!
//! A checkpoint rewrites the journal as one committed transaction holding
//! every live row, preceded by a `Checkpoint` marker.

mod reader;
mod record;
mod writer;

pub use reader::{read_journal, Journal};
pub use record::{compute_crc32, WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
pub use writer::Wal;
