//! Workouts.

use crate::error::{ModelError, ModelResult};
use crate::kind::{EntityKind, Record};
use crate::staged::{Staged, StagedPayload};
use crate::{Conflict, MergeConflict};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One training session.
///
/// Start and finish times are opaque timestamps chosen by the client; they
/// are compared as text when ordering workouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workout {
    /// Identity.
    pub workout_id: Uuid,
    /// When the session started, if it has.
    #[serde(default)]
    pub start_time: Option<String>,
    /// When the session finished, if it has.
    #[serde(default)]
    pub finish_time: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

impl Workout {
    /// Creates an unstarted workout.
    pub fn new(workout_id: Uuid) -> Self {
        Self {
            workout_id,
            start_time: None,
            finish_time: None,
            notes: String::new(),
        }
    }

    /// Sets the start time.
    #[must_use]
    pub fn started_at(mut self, time: impl Into<String>) -> Self {
        self.start_time = Some(time.into());
        self
    }

    /// Sets the finish time.
    #[must_use]
    pub fn finished_at(mut self, time: impl Into<String>) -> Self {
        self.finish_time = Some(time.into());
        self
    }

    /// Replaces the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Parses a hyphenated UUID, the only form used in keys.
pub(crate) fn parse_uuid(kind: &'static str, s: &str) -> ModelResult<Uuid> {
    let invalid = || ModelError::InvalidId {
        kind,
        value: s.to_string(),
    };
    if s.len() != 36 {
        return Err(invalid());
    }
    Uuid::try_parse(s).map_err(|_| invalid())
}

impl Record for Workout {
    type Id = Uuid;
    const KIND: EntityKind = EntityKind::Workout;

    fn id(&self) -> Uuid {
        self.workout_id
    }

    fn parse_id(key: &str) -> ModelResult<Uuid> {
        parse_uuid("workout", key)
    }

    fn same_content(&self, other: &Self) -> bool {
        self.start_time == other.start_time
            && self.finish_time == other.finish_time
            && self.notes == other.notes
    }

    fn staged_payload(id: Uuid, value: Staged<Self>) -> StagedPayload {
        StagedPayload::Workout {
            workout_id: id,
            value,
        }
    }

    fn merge_conflict(conflict: Conflict<Self>) -> MergeConflict {
        MergeConflict::Workout(conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_hyphenated_uuid() {
        let id = Uuid::new_v4();
        let key = Workout::key(&id);
        assert_eq!(key.len(), 36);
        assert_eq!(Workout::parse_id(&key).unwrap(), id);
        assert!(Workout::parse_id(&id.simple().to_string()).is_err());
        assert!(Workout::parse_id("not-a-uuid").is_err());
    }

    #[test]
    fn missing_optional_fields_default() {
        let id = Uuid::new_v4();
        let json = serde_json::json!({ "workout_id": id.to_string() });
        let workout: Workout = serde_json::from_value(json).unwrap();
        assert_eq!(workout, Workout::new(id));
    }

    #[test]
    fn content_compares_times_and_notes() {
        let a = Workout::new(Uuid::new_v4()).started_at("2024-01-01T10:00:00Z");
        let b = Workout {
            workout_id: Uuid::new_v4(),
            ..a.clone()
        };
        assert!(a.same_content(&b));
        assert!(!a.same_content(&b.clone().finished_at("2024-01-01T11:00:00Z")));
        assert!(!a.same_content(&b.with_notes("legs")));
    }
}
