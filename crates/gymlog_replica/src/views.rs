//! What the user sees: canonical rows with staged changes applied.
//!
//! Every view reads one snapshot, so it never mixes two commits.

use crate::error::ReplicaResult;
use crate::schema::TYPE_INDEX;
use crate::store::{load_canonical, load_staged, LocalStore};
use gymlog_core::{codec, ReadTransaction, TableReader};
use gymlog_model::{
    Exercise, ExerciseId, ExerciseType, MeasurementDate, MeasurementSet, MeasurementType, Record,
    Staged, Uuid, Workout,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The visible value of one entity.
fn visible<T: Record>(read: &ReadTransaction, key: &str) -> ReplicaResult<Option<T>> {
    match load_staged::<T, _>(read, key)? {
        Some(staged) => Ok(staged.into_value()),
        None => load_canonical(read, key),
    }
}

/// Canonical rows merged with staged rows, keyed and ordered by storage key.
fn overlay<T: Record>(
    canonical: Vec<(String, Vec<u8>)>,
    staged: Vec<(String, Vec<u8>)>,
) -> ReplicaResult<BTreeMap<String, T>> {
    let mut rows = BTreeMap::new();
    for (key, bytes) in canonical {
        rows.insert(key, codec::decode::<T>(&bytes)?);
    }
    for (key, bytes) in staged {
        match codec::decode::<Staged<T>>(&bytes)? {
            Staged::Value(value) => {
                rows.insert(key, value);
            }
            Staged::Deleted => {
                rows.remove(&key);
            }
        }
    }
    Ok(rows)
}

fn visible_all<T: Record>(read: &ReadTransaction) -> ReplicaResult<BTreeMap<String, T>> {
    overlay(
        read.scan(T::KIND.canonical_table())?,
        read.scan(T::KIND.staged_table())?,
    )
}

impl LocalStore {
    /// The measurement set for `date`.
    pub fn measurement_set(&self, date: &MeasurementDate) -> ReplicaResult<Option<MeasurementSet>> {
        visible(&self.database().read()?, &MeasurementSet::key(date))
    }

    /// Every date with a measurement set, latest first.
    pub fn measurement_dates(&self) -> ReplicaResult<Vec<MeasurementDate>> {
        let sets = visible_all::<MeasurementSet>(&self.database().read()?)?;
        Ok(sets.into_values().rev().map(|set| set.date).collect())
    }

    /// Every recorded value of one measurement type, earliest first.
    pub fn measurements_of_type(
        &self,
        kind: MeasurementType,
    ) -> ReplicaResult<Vec<(MeasurementDate, f64)>> {
        let sets = visible_all::<MeasurementSet>(&self.database().read()?)?;
        Ok(sets
            .into_values()
            .filter_map(|set| {
                let value = set.measurements.get(&kind).copied()?;
                Some((set.date, value))
            })
            .collect())
    }

    /// Every workout.
    ///
    /// Workouts that have not started come first, then the rest by start
    /// time, latest first. Ties are broken by id.
    pub fn workouts(&self) -> ReplicaResult<Vec<Workout>> {
        let mut workouts: Vec<Workout> = visible_all::<Workout>(&self.database().read()?)?
            .into_values()
            .collect();
        workouts.sort_by(|a, b| match (&a.start_time, &b.start_time) {
            (None, None) => a.workout_id.cmp(&b.workout_id),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(x).then_with(|| a.workout_id.cmp(&b.workout_id)),
        });
        Ok(workouts)
    }

    /// The workout with `id`.
    pub fn workout(&self, id: &Uuid) -> ReplicaResult<Option<Workout>> {
        visible(&self.database().read()?, &Workout::key(id))
    }

    /// The exercises of one workout, by position.
    pub fn exercises_of_workout(&self, workout_id: &Uuid) -> ReplicaResult<Vec<Exercise>> {
        let read = self.database().read()?;
        let prefix = ExerciseId::workout_prefix(workout_id);
        let rows = overlay::<Exercise>(
            read.scan_prefix(Exercise::KIND.canonical_table(), &prefix)?,
            read.scan_prefix(Exercise::KIND.staged_table(), &prefix)?,
        )?;
        let mut exercises: Vec<Exercise> = rows.into_values().collect();
        exercises.sort_by_key(|e| e.order);
        Ok(exercises)
    }

    /// Every exercise of one type, in id order.
    pub fn exercises_of_type(&self, exercise_type: ExerciseType) -> ReplicaResult<Vec<Exercise>> {
        let read = self.database().read()?;
        let name = exercise_type.as_str();
        let keys: BTreeSet<String> = read
            .index_scan(Exercise::KIND.canonical_table(), TYPE_INDEX, name)?
            .into_iter()
            .chain(read.index_scan(Exercise::KIND.staged_table(), TYPE_INDEX, name)?)
            .map(|(key, _)| key)
            .collect();

        // a staged edit may have changed the type or deleted the exercise
        let mut exercises = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(exercise) = visible::<Exercise>(&read, &key)? {
                if exercise.exercise_type == exercise_type {
                    exercises.push(exercise);
                }
            }
        }
        Ok(exercises)
    }

    /// Pairs each exercise with its workout.
    ///
    /// Exercises whose workout is no longer visible are left out.
    pub fn join_workouts(&self, exercises: Vec<Exercise>) -> ReplicaResult<Vec<(Workout, Exercise)>> {
        let read = self.database().read()?;
        let mut workouts: HashMap<Uuid, Option<Workout>> = HashMap::new();
        let mut joined = Vec::with_capacity(exercises.len());
        for exercise in exercises {
            let workout_id = exercise.id.workout_id();
            let workout = match workouts.get(&workout_id) {
                Some(found) => found.clone(),
                None => {
                    let found = visible::<Workout>(&read, &Workout::key(&workout_id))?;
                    workouts.insert(workout_id, found.clone());
                    found
                }
            };
            if let Some(workout) = workout {
                joined.push((workout, exercise));
            }
        }
        Ok(joined)
    }
}
