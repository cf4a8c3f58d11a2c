//! # gymlog sync
//!
//! Keeps a [`gymlog_replica::LocalStore`] in step with the server.
//!
//! - [`UploadCoordinator`] uploads staged changes one at a time, pulling
//!   and merging on version conflicts, and asks a [`ConflictResolver`] when
//!   a merge conflicts
//! - [`SyncScheduler`] runs cycles in the background: debounced on request,
//!   periodically as a fallback, never two at once
//! - [`HttpRemote`] implements [`RemoteApi`] over any [`HttpClient`]
//!
//! ## Failure handling
//!
//! | Error | Effect |
//! |-------|--------|
//! | [`SyncError::VersionConflict`] | pull, merge, retry the upload |
//! | [`SyncError::WriteLockBusy`] | cycle ends, retried after `Retry-After` |
//! | [`SyncError::Unauthenticated`] | cycle ends, [`Navigator::require_login`] |
//! | anything else | cycle ends, logged, retried on the next trigger |
//!
//! Staged changes are only removed after the server accepted them, so a
//! failed cycle never loses local edits.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod http;
mod remote;
mod scheduler;

pub use config::SyncConfig;
pub use coordinator::{CycleReport, PullOutcome, PushOutcome, UploadCoordinator};
pub use error::{SyncError, SyncResult};
pub use http::{classify, HttpClient, HttpMethod, HttpRemote, HttpRequest, HttpResponse};
pub use remote::{ConflictResolver, CredentialProvider, Navigator, RemoteApi};
pub use scheduler::{SyncHandle, SyncScheduler, SyncState, SyncStats};
