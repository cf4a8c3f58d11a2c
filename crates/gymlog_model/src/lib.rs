//! # gymlog model
//!
//! Entity definitions and the types exchanged with the sync server.
//!
//! ## Entities
//!
//! - [`MeasurementSet`] - body measurements for one day, keyed by date
//! - [`Workout`] - one training session, keyed by UUID
//! - [`Exercise`] - one exercise within a workout, keyed by [`ExerciseId`]
//!
//! Each implements [`Record`], which gives the storage key, the kind and the
//! content comparison used to decide whether a local edit still differs from
//! the server's copy.
//!
//! ## Sync types
//!
//! - [`Staged`] - a pending local upsert or delete
//! - [`StagedChange`] - one pending change selected for upload
//! - [`UserChanges`] - a remote changeset since some version
//! - [`MergeConflict`] and [`Resolutions`] - disagreements and how to settle them

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod changes;
mod conflict;
mod error;
mod exercise;
mod kind;
mod measurement;
mod staged;
mod workout;

pub use changes::{DeleteRequest, ModifyRequest, UserChanges};
pub use conflict::{Conflict, MergeConflict, Resolution, Resolutions};
pub use error::{ModelError, ModelResult};
pub use exercise::{
    DistanceSet, Exercise, ExerciseCategory, ExerciseId, ExerciseType, RepetitionSet, SetList,
};
pub use kind::{EntityKind, Record};
pub use measurement::{MeasurementDate, MeasurementSet, MeasurementType};
pub use staged::{Staged, StagedChange, StagedPayload};
pub use workout::Workout;

pub use uuid::Uuid;
