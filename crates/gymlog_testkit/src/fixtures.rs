//! Deterministic ids and ready-made entities.

use gymlog_model::{
    DistanceSet, Exercise, ExerciseId, ExerciseType, MeasurementDate, MeasurementSet,
    MeasurementType, RepetitionSet, SetList, Workout,
};
use uuid::Uuid;

/// A UUID derived from `n`, stable across runs.
pub fn uuid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// Parses a `YYYY-MM-DD` date, panicking on bad input.
pub fn date(s: &str) -> MeasurementDate {
    match MeasurementDate::parse(s) {
        Ok(date) => date,
        Err(err) => panic!("bad fixture date {s:?}: {err}"),
    }
}

/// A workout with id `uuid(n)` and the given notes.
pub fn workout(n: u128, notes: &str) -> Workout {
    Workout::new(uuid(n)).with_notes(notes)
}

/// A measurement set recording only a weight.
pub fn measurement_set(day: &str, weight: f64) -> MeasurementSet {
    MeasurementSet::new(date(day)).with(MeasurementType::Weight, weight)
}

/// A seated row with `sets` sets of ten repetitions, in workout `uuid(workout_n)`.
pub fn lifting_exercise(workout_n: u128, exercise_n: u128, order: u32, sets: u32) -> Exercise {
    let id = ExerciseId::new(uuid(workout_n), uuid(exercise_n));
    let sets = (0..sets)
        .map(|i| RepetitionSet {
            set_id: uuid(exercise_n << 16 | u128::from(i)),
            repetitions: 10,
            resistance: 40 + 5 * i,
        })
        .collect();
    Exercise::new(id, ExerciseType::SeatedRow, order).with_sets(SetList::Repetition(sets))
}

/// A treadmill run of `meters`, in workout `uuid(workout_n)`.
pub fn cardio_exercise(workout_n: u128, exercise_n: u128, order: u32, meters: u32) -> Exercise {
    let id = ExerciseId::new(uuid(workout_n), uuid(exercise_n));
    let set = DistanceSet {
        set_id: uuid(exercise_n << 16),
        resistance: 2,
        distance: meters,
        duration: meters / 3,
    };
    Exercise::new(id, ExerciseType::Treadmill, order).with_sets(SetList::Distance(vec![set]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymlog_model::Record;

    #[test]
    fn fixtures_are_valid_and_stable() {
        assert_eq!(workout(3, "x"), workout(3, "x"));
        assert!(lifting_exercise(1, 2, 0, 3).validate().is_ok());
        assert!(cardio_exercise(1, 3, 1, 3000).validate().is_ok());
        assert_eq!(lifting_exercise(1, 2, 0, 3).sets.len(), 3);
        assert_eq!(measurement_set("2024-01-01", 80.0).date, date("2024-01-01"));
    }
}
