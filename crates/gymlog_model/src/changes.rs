//! Bodies exchanged with the sync server.

use crate::exercise::{Exercise, ExerciseId};
use crate::measurement::{MeasurementDate, MeasurementSet};
use crate::workout::Workout;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything that changed on the server since some version.
///
/// Returned by `GET /user?since={version}`. Absent lists decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserChanges {
    /// Server version after these changes.
    pub version: u64,
    /// Created or modified measurement sets.
    #[serde(default)]
    pub measurement_sets: Vec<MeasurementSet>,
    /// Created or modified workouts.
    #[serde(default)]
    pub workouts: Vec<Workout>,
    /// Created or modified exercises.
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    /// Deleted measurement sets.
    #[serde(default)]
    pub deleted_measurement_sets: Vec<MeasurementDate>,
    /// Deleted workouts.
    #[serde(default)]
    pub deleted_workouts: Vec<Uuid>,
    /// Deleted exercises.
    #[serde(default)]
    pub deleted_exercises: Vec<ExerciseId>,
}

impl UserChanges {
    /// An empty changeset at `version`.
    pub fn at_version(version: u64) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Number of entity changes carried.
    pub fn change_count(&self) -> usize {
        self.measurement_sets.len()
            + self.workouts.len()
            + self.exercises.len()
            + self.deleted_measurement_sets.len()
            + self.deleted_workouts.len()
            + self.deleted_exercises.len()
    }

    /// Returns true if no entity changed.
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

/// Body of a `PUT` upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifyRequest<'a, T> {
    /// Canonical version the change was made against.
    pub version: u64,
    /// The new value.
    pub item: &'a T,
}

/// Body of a `DELETE` upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    /// Canonical version the change was made against.
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_lists_default_to_empty() {
        let changes: UserChanges = serde_json::from_value(json!({ "version": 4 })).unwrap();
        assert_eq!(changes, UserChanges::at_version(4));
        assert!(changes.is_empty());
    }

    #[test]
    fn deletions_decode_typed_ids() {
        let w = Uuid::new_v4();
        let e = Uuid::new_v4();
        let changes: UserChanges = serde_json::from_value(json!({
            "version": 9,
            "deleted_measurement_sets": ["2024-01-02"],
            "deleted_workouts": [w.to_string()],
            "deleted_exercises": [format!("{w}#{e}")],
        }))
        .unwrap();
        assert_eq!(changes.change_count(), 3);
        assert_eq!(changes.deleted_exercises[0], ExerciseId::new(w, e));

        let bad = json!({ "version": 1, "deleted_exercises": ["nope"] });
        assert!(serde_json::from_value::<UserChanges>(bad).is_err());
    }

    #[test]
    fn request_bodies() {
        let workout = Workout::new(Uuid::new_v4());
        let body = serde_json::to_value(ModifyRequest {
            version: 2,
            item: &workout,
        })
        .unwrap();
        assert_eq!(body["version"], 2);
        assert_eq!(body["item"]["workout_id"], workout.workout_id.to_string());
        assert_eq!(
            serde_json::to_value(DeleteRequest { version: 5 }).unwrap(),
            json!({ "version": 5 })
        );
    }
}
