//! # gymlog testkit
//!
//! Shared test support for the gymlog crates.
//!
//! - [`fixtures`]: deterministic ids and ready-made entities
//! - [`TestStore`]: a replica in memory or in a temporary directory
//! - [`FakeRemote`]: an in-memory versioned server with scripted failures
//! - [`ScriptedResolver`], [`RecordingNavigator`], [`StaticCredentials`]:
//!   collaborator doubles
//! - [`strategies`]: proptest strategies for every entity kind
//!
//! ```rust
//! use gymlog_testkit::prelude::*;
//!
//! let store = TestStore::in_memory();
//! store.stage_upsert(&workout(1, "legs")).unwrap();
//! assert_eq!(store.staged_count().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collaborators;
pub mod fixtures;
mod remote;
mod store;
pub mod strategies;

pub use collaborators::{RecordingNavigator, ScriptedResolver, StaticCredentials};
pub use remote::{Failure, FakeRemote, RemoteChange, RemoteEntity, Request};
pub use store::TestStore;

/// Everything a test usually needs.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::{
        Failure, FakeRemote, RecordingNavigator, RemoteEntity, Request, ScriptedResolver,
        StaticCredentials, TestStore,
    };
    pub use gymlog_model::*;
    pub use gymlog_replica::LocalStore;
    pub use gymlog_sync::*;
}
