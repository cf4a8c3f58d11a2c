//! Property-based test strategies using proptest.
//!
//! Every generated entity is valid: dates exist, exercise sets match the
//! exercise's category.

use gymlog_model::{
    DistanceSet, Exercise, ExerciseCategory, ExerciseId, ExerciseType, MeasurementDate,
    MeasurementSet, MeasurementType, RepetitionSet, SetList, Uuid, Workout,
};
use proptest::prelude::*;

/// Strategy for UUIDs.
pub fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Strategy for UUIDs drawn from a small pool, so collisions are likely.
pub fn pooled_uuid_strategy(pool: u128) -> impl Strategy<Value = Uuid> {
    (1..=pool.max(1)).prop_map(Uuid::from_u128)
}

/// Strategy for calendar dates between 2000 and 2099.
pub fn date_strategy() -> impl Strategy<Value = MeasurementDate> {
    (2000u32..2100, 1u32..=12, 1u32..=28).prop_filter_map(
        "date must parse",
        |(year, month, day)| MeasurementDate::parse(&format!("{year:04}-{month:02}-{day:02}")).ok(),
    )
}

/// Strategy for short free-form notes.
pub fn notes_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z ]{0,16}").expect("Invalid regex")
}

/// Strategy for measurement sets.
pub fn measurement_set_strategy() -> impl Strategy<Value = MeasurementSet> {
    (
        date_strategy(),
        notes_strategy(),
        prop::collection::btree_map(
            prop::sample::select(MeasurementType::ALL.to_vec()),
            1.0f64..300.0,
            0..4,
        ),
    )
        .prop_map(|(date, notes, measurements)| MeasurementSet {
            date,
            notes,
            measurements,
        })
}

/// Strategy for workouts, started or not.
pub fn workout_strategy() -> impl Strategy<Value = Workout> {
    (
        uuid_strategy(),
        notes_strategy(),
        prop::option::of((0u32..24, 0u32..60)),
    )
        .prop_map(|(id, notes, start)| {
            let workout = Workout::new(id).with_notes(notes);
            match start {
                Some((hour, minute)) => {
                    workout.started_at(format!("2024-03-01T{hour:02}:{minute:02}:00Z"))
                }
                None => workout,
            }
        })
}

fn repetition_set_strategy() -> impl Strategy<Value = RepetitionSet> {
    (uuid_strategy(), 1u32..30, 0u32..200).prop_map(|(set_id, repetitions, resistance)| {
        RepetitionSet {
            set_id,
            repetitions,
            resistance,
        }
    })
}

fn distance_set_strategy() -> impl Strategy<Value = DistanceSet> {
    (uuid_strategy(), 0u32..20, 1u32..20_000, 1u32..7_200).prop_map(
        |(set_id, resistance, distance, duration)| DistanceSet {
            set_id,
            resistance,
            distance,
            duration,
        },
    )
}

fn sets_strategy(category: ExerciseCategory) -> BoxedStrategy<SetList> {
    match category {
        ExerciseCategory::Repetition => prop::collection::vec(repetition_set_strategy(), 0..5)
            .prop_map(SetList::Repetition)
            .boxed(),
        ExerciseCategory::Distance => prop::collection::vec(distance_set_strategy(), 0..3)
            .prop_map(SetList::Distance)
            .boxed(),
    }
}

/// Strategy for exercises belonging to `workout_id`.
pub fn exercise_in_strategy(workout_id: Uuid) -> impl Strategy<Value = Exercise> {
    (
        uuid_strategy(),
        prop::sample::select(ExerciseType::ALL.to_vec()),
        0u32..10,
        notes_strategy(),
    )
        .prop_flat_map(move |(exercise_id, exercise_type, order, notes)| {
            sets_strategy(exercise_type.category()).prop_map(move |sets| {
                Exercise::new(ExerciseId::new(workout_id, exercise_id), exercise_type, order)
                    .with_notes(notes.clone())
                    .with_sets(sets)
            })
        })
}

/// Strategy for exercises in any workout.
pub fn exercise_strategy() -> impl Strategy<Value = Exercise> {
    uuid_strategy().prop_flat_map(exercise_in_strategy)
}

/// Strategy for a workout together with its exercises.
pub fn workout_with_exercises_strategy(
    max_exercises: usize,
) -> impl Strategy<Value = (Workout, Vec<Exercise>)> {
    workout_strategy().prop_flat_map(move |workout| {
        let exercises =
            prop::collection::vec(exercise_in_strategy(workout.workout_id), 0..=max_exercises);
        (Just(workout), exercises)
    })
}
