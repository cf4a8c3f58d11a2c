//! Exercises and their sets.

use crate::error::{ModelError, ModelResult};
use crate::kind::{EntityKind, Record};
use crate::staged::{Staged, StagedPayload};
use crate::workout::parse_uuid;
use crate::{Conflict, MergeConflict};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which set shape an exercise type records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExerciseCategory {
    /// Repetitions against a resistance.
    Repetition,
    /// Distance over a duration against a resistance.
    Distance,
}

impl ExerciseCategory {
    /// Name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repetition => "repetition",
            Self::Distance => "distance",
        }
    }
}

/// Kind of exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExerciseType {
    /// Biceps curl.
    BicepsCurl,
    /// Chest press.
    ChestPress,
    /// Dumbbell wrist curl.
    DumbbellWristCurl,
    /// Fixed pulldown.
    FixedPulldown,
    /// Leg extension.
    LegExtension,
    /// Pectoral fly.
    PectoralFly,
    /// Seated row.
    SeatedRow,
    /// Shoulder press.
    ShoulderPress,
    /// Triceps extension.
    TricepsExtension,
    /// Elliptical cross trainer.
    EllipticalCrossTrainer,
    /// Recumbent bike.
    RecumbentBike,
    /// Treadmill.
    Treadmill,
    /// Upright bike.
    UprightBike,
}

impl ExerciseType {
    /// Every exercise type.
    pub const ALL: [ExerciseType; 13] = [
        Self::BicepsCurl,
        Self::ChestPress,
        Self::DumbbellWristCurl,
        Self::FixedPulldown,
        Self::LegExtension,
        Self::PectoralFly,
        Self::SeatedRow,
        Self::ShoulderPress,
        Self::TricepsExtension,
        Self::EllipticalCrossTrainer,
        Self::RecumbentBike,
        Self::Treadmill,
        Self::UprightBike,
    ];

    /// Wire name of the type, also used as the index key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BicepsCurl => "biceps-curl",
            Self::ChestPress => "chest-press",
            Self::DumbbellWristCurl => "dumbbell-wrist-curl",
            Self::FixedPulldown => "fixed-pulldown",
            Self::LegExtension => "leg-extension",
            Self::PectoralFly => "pectoral-fly",
            Self::SeatedRow => "seated-row",
            Self::ShoulderPress => "shoulder-press",
            Self::TricepsExtension => "triceps-extension",
            Self::EllipticalCrossTrainer => "elliptical-cross-trainer",
            Self::RecumbentBike => "recumbent-bike",
            Self::Treadmill => "treadmill",
            Self::UprightBike => "upright-bike",
        }
    }

    /// The set shape this type records.
    pub fn category(&self) -> ExerciseCategory {
        match self {
            Self::EllipticalCrossTrainer | Self::RecumbentBike | Self::Treadmill | Self::UprightBike => {
                ExerciseCategory::Distance
            }
            _ => ExerciseCategory::Repetition,
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ModelError::UnknownType {
                kind: "exercise",
                value: s.to_string(),
            })
    }
}

/// A set of a repetition exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionSet {
    /// Identity within the exercise.
    pub set_id: Uuid,
    /// Number of repetitions.
    pub repetitions: u32,
    /// Resistance level; unit depends on the machine.
    pub resistance: u32,
}

/// A set of a distance exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceSet {
    /// Identity within the exercise.
    pub set_id: Uuid,
    /// Resistance level; unit depends on the machine.
    pub resistance: u32,
    /// Distance in meters.
    pub distance: u32,
    /// Duration in seconds.
    pub duration: u32,
}

/// The sets of one exercise, all of the same shape.
///
/// Serialized as a bare array. An empty array has no shape, so two empty
/// lists compare equal whatever their variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SetList {
    /// Sets of a repetition exercise.
    Repetition(Vec<RepetitionSet>),
    /// Sets of a distance exercise.
    Distance(Vec<DistanceSet>),
}

impl SetList {
    /// An empty list of the shape `category` records.
    pub fn empty(category: ExerciseCategory) -> Self {
        match category {
            ExerciseCategory::Repetition => Self::Repetition(Vec::new()),
            ExerciseCategory::Distance => Self::Distance(Vec::new()),
        }
    }

    /// Number of sets.
    pub fn len(&self) -> usize {
        match self {
            Self::Repetition(sets) => sets.len(),
            Self::Distance(sets) => sets.len(),
        }
    }

    /// Returns true if there are no sets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the sets can belong to an exercise of `category`.
    pub fn fits(&self, category: ExerciseCategory) -> bool {
        self.is_empty()
            || matches!(
                (self, category),
                (Self::Repetition(_), ExerciseCategory::Repetition)
                    | (Self::Distance(_), ExerciseCategory::Distance)
            )
    }
}

impl PartialEq for SetList {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Repetition(a), Self::Repetition(b)) => a == b,
            (Self::Distance(a), Self::Distance(b)) => a == b,
            _ => self.is_empty() && other.is_empty(),
        }
    }
}

/// Composite identity of an exercise: `<workout uuid>#<exercise uuid>`.
///
/// The textual form starts with the workout id, so all exercises of one
/// workout share the prefix returned by [`ExerciseId::workout_prefix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExerciseId {
    workout_id: Uuid,
    exercise_id: Uuid,
}

impl ExerciseId {
    /// Combines a workout id and an exercise id.
    pub fn new(workout_id: Uuid, exercise_id: Uuid) -> Self {
        Self {
            workout_id,
            exercise_id,
        }
    }

    /// Parses `<uuid>#<uuid>`.
    pub fn parse(s: &str) -> ModelResult<Self> {
        let invalid = || ModelError::InvalidId {
            kind: "exercise",
            value: s.to_string(),
        };
        let (workout, exercise) = s.split_once('#').ok_or_else(invalid)?;
        let workout_id = parse_uuid("exercise", workout).map_err(|_| invalid())?;
        let exercise_id = parse_uuid("exercise", exercise).map_err(|_| invalid())?;
        Ok(Self::new(workout_id, exercise_id))
    }

    /// The owning workout.
    pub fn workout_id(&self) -> Uuid {
        self.workout_id
    }

    /// The exercise part of the id.
    pub fn exercise_id(&self) -> Uuid {
        self.exercise_id
    }

    /// Key prefix shared by every exercise of `workout_id`.
    pub fn workout_prefix(workout_id: &Uuid) -> String {
        format!("{workout_id}#")
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.workout_id, self.exercise_id)
    }
}

impl FromStr for ExerciseId {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ExerciseId {
    type Error = ModelError;

    fn try_from(value: String) -> ModelResult<Self> {
        Self::parse(&value)
    }
}

impl From<ExerciseId> for String {
    fn from(id: ExerciseId) -> Self {
        id.to_string()
    }
}

/// One exercise within a workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExerciseRepr")]
pub struct Exercise {
    /// Identity.
    #[serde(rename = "workout_exercise_id")]
    pub id: ExerciseId,
    /// Position within the workout.
    pub order: u32,
    /// Free-form notes.
    pub notes: String,
    /// Kind of exercise.
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
    /// Recorded sets.
    pub sets: SetList,
}

#[derive(Deserialize)]
struct ExerciseRepr {
    workout_exercise_id: ExerciseId,
    #[serde(default)]
    order: u32,
    #[serde(default)]
    notes: String,
    #[serde(rename = "type")]
    exercise_type: ExerciseType,
    #[serde(default)]
    sets: Option<SetList>,
}

impl TryFrom<ExerciseRepr> for Exercise {
    type Error = ModelError;

    fn try_from(repr: ExerciseRepr) -> ModelResult<Self> {
        let category = repr.exercise_type.category();
        let sets = match repr.sets {
            Some(sets) if !sets.is_empty() => sets,
            _ => SetList::empty(category),
        };
        let exercise = Self {
            id: repr.workout_exercise_id,
            order: repr.order,
            notes: repr.notes,
            exercise_type: repr.exercise_type,
            sets,
        };
        exercise.validate()?;
        Ok(exercise)
    }
}

impl Exercise {
    /// Creates an exercise with no sets.
    pub fn new(id: ExerciseId, exercise_type: ExerciseType, order: u32) -> Self {
        Self {
            id,
            order,
            notes: String::new(),
            exercise_type,
            sets: SetList::empty(exercise_type.category()),
        }
    }

    /// Replaces the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Replaces the sets.
    #[must_use]
    pub fn with_sets(mut self, sets: SetList) -> Self {
        self.sets = sets;
        self
    }
}

impl Record for Exercise {
    type Id = ExerciseId;
    const KIND: EntityKind = EntityKind::Exercise;

    fn id(&self) -> ExerciseId {
        self.id
    }

    fn parse_id(key: &str) -> ModelResult<ExerciseId> {
        ExerciseId::parse(key)
    }

    fn same_content(&self, other: &Self) -> bool {
        self.order == other.order
            && self.exercise_type == other.exercise_type
            && self.notes == other.notes
            && self.sets == other.sets
    }

    fn validate(&self) -> ModelResult<()> {
        let category = self.exercise_type.category();
        if self.sets.fits(category) {
            Ok(())
        } else {
            Err(ModelError::SetShapeMismatch {
                exercise_type: self.exercise_type.to_string(),
                expected: category.as_str(),
            })
        }
    }

    fn staged_payload(id: ExerciseId, value: Staged<Self>) -> StagedPayload {
        StagedPayload::Exercise { id, value }
    }

    fn merge_conflict(conflict: Conflict<Self>) -> MergeConflict {
        MergeConflict::Exercise(conflict)
    }
}
