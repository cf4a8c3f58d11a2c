//! Entity kinds and the behavior shared by every entity.

use crate::conflict::{Conflict, MergeConflict};
use crate::error::ModelResult;
use crate::staged::{Staged, StagedPayload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// The three kinds of entity the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// Measurement sets.
    MeasurementSet,
    /// Workouts.
    Workout,
    /// Exercises.
    Exercise,
}

impl EntityKind {
    /// Order in which staged tables are drained.
    pub const SCAN_ORDER: [EntityKind; 3] = [Self::MeasurementSet, Self::Workout, Self::Exercise];

    /// Table holding the server-confirmed copies.
    pub fn canonical_table(&self) -> &'static str {
        match self {
            Self::MeasurementSet => "measurement",
            Self::Workout => "workout",
            Self::Exercise => "exercise",
        }
    }

    /// Table holding pending local changes.
    pub fn staged_table(&self) -> &'static str {
        match self {
            Self::MeasurementSet => "staged_measurement",
            Self::Workout => "staged_workout",
            Self::Exercise => "staged_exercise",
        }
    }

    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeasurementSet => "measurement_set",
            Self::Workout => "workout",
            Self::Exercise => "exercise",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity stored in the replica.
///
/// The textual form of [`Record::Id`] is the storage key, and key order is
/// the order scans return entities in.
pub trait Record:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Identity type.
    type Id: Clone
        + fmt::Debug
        + fmt::Display
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Which kind this is.
    const KIND: EntityKind;

    /// Identity of this entity.
    fn id(&self) -> Self::Id;

    /// Parses a storage key back into an id.
    fn parse_id(key: &str) -> ModelResult<Self::Id>;

    /// Compares everything except identity.
    fn same_content(&self, other: &Self) -> bool;

    /// Wraps a staged value into the kind-polymorphic payload.
    fn staged_payload(id: Self::Id, value: Staged<Self>) -> StagedPayload;

    /// Wraps a conflict into the kind-polymorphic conflict.
    fn merge_conflict(conflict: Conflict<Self>) -> MergeConflict;

    /// Storage key for `id`.
    fn key(id: &Self::Id) -> String {
        id.to_string()
    }

    /// Checks invariants that serde alone does not.
    fn validate(&self) -> ModelResult<()> {
        Ok(())
    }
}
