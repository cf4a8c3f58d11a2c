//! Pending local changes.

use crate::exercise::{Exercise, ExerciseId};
use crate::kind::{EntityKind, Record};
use crate::measurement::{MeasurementDate, MeasurementSet};
use crate::workout::Workout;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A staged entry: either a local deletion or a local upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Staged<T> {
    /// Deleted locally.
    Deleted,
    /// Created or edited locally.
    Value(T),
}

impl<T> Staged<T> {
    /// Returns true for a deletion.
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// The staged value, if any.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Deleted => None,
            Self::Value(value) => Some(value),
        }
    }

    /// Converts into the staged value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Deleted => None,
            Self::Value(value) => Some(value),
        }
    }
}

impl<T: Record> Staged<T> {
    /// Compares two staged entries by content.
    ///
    /// Two deletions are the same; a deletion never equals a value.
    pub fn same_content(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Deleted, Self::Deleted) => true,
            (Self::Value(a), Self::Value(b)) => a.same_content(b),
            _ => false,
        }
    }
}

impl<T> From<Option<T>> for Staged<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Deleted, Self::Value)
    }
}

/// A staged entry of any kind, with its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagedPayload {
    /// A measurement set change.
    MeasurementSet {
        /// Identity.
        date: MeasurementDate,
        /// The change.
        value: Staged<MeasurementSet>,
    },
    /// A workout change.
    Workout {
        /// Identity.
        workout_id: Uuid,
        /// The change.
        value: Staged<Workout>,
    },
    /// An exercise change.
    Exercise {
        /// Identity.
        id: ExerciseId,
        /// The change.
        value: Staged<Exercise>,
    },
}

impl StagedPayload {
    /// Kind of the changed entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::MeasurementSet { .. } => EntityKind::MeasurementSet,
            Self::Workout { .. } => EntityKind::Workout,
            Self::Exercise { .. } => EntityKind::Exercise,
        }
    }

    /// Storage key of the changed entity.
    pub fn key(&self) -> String {
        match self {
            Self::MeasurementSet { date, .. } => date.to_string(),
            Self::Workout { workout_id, .. } => workout_id.to_string(),
            Self::Exercise { id, .. } => id.to_string(),
        }
    }

    /// Returns true if the change deletes the entity.
    pub fn is_deletion(&self) -> bool {
        match self {
            Self::MeasurementSet { value, .. } => value.is_deleted(),
            Self::Workout { value, .. } => value.is_deleted(),
            Self::Exercise { value, .. } => value.is_deleted(),
        }
    }

    /// Server path addressing the entity, without a leading slash.
    pub fn route(&self) -> String {
        match self {
            Self::MeasurementSet { date, .. } => format!("user/measurement/{date}"),
            Self::Workout { workout_id, .. } => format!("user/workout/{workout_id}"),
            Self::Exercise { id, .. } => format!(
                "user/workout/{}/exercise/{}",
                id.workout_id(),
                id.exercise_id()
            ),
        }
    }
}

/// One staged change selected for upload.
///
/// `version` is the canonical version the change was read against; the
/// server rejects the upload if its own version has moved past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedChange {
    /// Canonical version at selection time.
    pub version: u64,
    /// The change.
    pub payload: StagedPayload,
}

impl StagedChange {
    /// Creates a change.
    pub fn new(version: u64, payload: StagedPayload) -> Self {
        Self { version, payload }
    }

    /// Storage key of the changed entity.
    pub fn id(&self) -> String {
        self.payload.key()
    }

    /// Kind of the changed entity.
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExerciseType;

    #[test]
    fn routes_address_each_kind() {
        let date = MeasurementDate::parse("2024-05-06").unwrap();
        let change = StagedChange::new(
            3,
            StagedPayload::MeasurementSet {
                date: date.clone(),
                value: Staged::Deleted,
            },
        );
        assert_eq!(change.payload.route(), "user/measurement/2024-05-06");
        assert!(change.payload.is_deletion());
        assert_eq!(change.id(), "2024-05-06");

        let w = Uuid::new_v4();
        let e = Uuid::new_v4();
        let id = ExerciseId::new(w, e);
        let payload = StagedPayload::Exercise {
            id,
            value: Staged::Value(Exercise::new(id, ExerciseType::LegExtension, 0)),
        };
        assert_eq!(payload.route(), format!("user/workout/{w}/exercise/{e}"));
        assert_eq!(payload.kind(), EntityKind::Exercise);
        assert!(!payload.is_deletion());
    }

    #[test]
    fn staged_content_comparison() {
        let w = Workout::new(Uuid::new_v4());
        let edited = w.clone().with_notes("x");
        assert!(Staged::<Workout>::Deleted.same_content(&Staged::Deleted));
        assert!(Staged::Value(w.clone()).same_content(&Staged::Value(w.clone())));
        assert!(!Staged::Value(w.clone()).same_content(&Staged::Value(edited)));
        assert!(!Staged::Value(w).same_content(&Staged::Deleted));
    }

    #[test]
    fn staged_survives_cbor() {
        let w = Workout::new(Uuid::new_v4()).started_at("2024-01-01T09:00:00Z");
        for staged in [Staged::Deleted, Staged::Value(w)] {
            let mut bytes = Vec::new();
            ciborium::into_writer(&staged, &mut bytes).unwrap();
            let back: Staged<Workout> = ciborium::from_reader(bytes.as_slice()).unwrap();
            assert_eq!(back, staged);
        }
    }
}
