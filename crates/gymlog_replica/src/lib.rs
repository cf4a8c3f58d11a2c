//! # gymlog replica
//!
//! The device-local copy of one account's training log.
//!
//! Two copies of every entity live side by side:
//!
//! - the **canonical** copy, exactly what the server confirmed as of the
//!   stored version
//! - the **staged** copy, local edits and deletions not yet uploaded
//!
//! Readers see canonical with staged applied. Remote changesets are folded
//! in with [`LocalStore::merge`], which either applies the whole changeset or
//! reports every conflict and changes nothing. Uploads drain the staged
//! tables one change at a time through [`LocalStore::next_staged_change`] and
//! [`LocalStore::apply_upload`].
//!
//! ```rust
//! use gymlog_model::{Uuid, Workout};
//! use gymlog_replica::LocalStore;
//!
//! let store = LocalStore::open_in_memory().unwrap();
//! let workout = Workout::new(Uuid::new_v4()).with_notes("leg day");
//! store.stage_upsert(&workout).unwrap();
//!
//! let change = store.next_staged_change().unwrap().unwrap();
//! assert_eq!(change.version, 0);
//! store.apply_upload(&change).unwrap();
//!
//! assert_eq!(store.version().unwrap(), 1);
//! assert_eq!(store.staged_count().unwrap(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod merge;
mod schema;
mod store;
mod upload;
mod views;

pub use error::{ReplicaError, ReplicaResult};
pub use schema::{replica_schema, AUTH_TABLE, TYPE_INDEX, VERSION_TABLE};
pub use store::LocalStore;
