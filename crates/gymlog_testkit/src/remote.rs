//! An in-memory sync server.

use async_trait::async_trait;
use gymlog_model::{
    EntityKind, Exercise, ExerciseId, MeasurementDate, MeasurementSet, Record, Staged,
    StagedChange, StagedPayload, UserChanges, Uuid, Workout,
};
use gymlog_sync::{RemoteApi, SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// A current server-side entity.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEntity {
    /// A measurement set.
    MeasurementSet(MeasurementSet),
    /// A workout.
    Workout(Workout),
    /// An exercise.
    Exercise(Exercise),
}

impl RemoteEntity {
    fn kind(&self) -> EntityKind {
        match self {
            Self::MeasurementSet(_) => EntityKind::MeasurementSet,
            Self::Workout(_) => EntityKind::Workout,
            Self::Exercise(_) => EntityKind::Exercise,
        }
    }

    fn key(&self) -> String {
        match self {
            Self::MeasurementSet(m) => MeasurementSet::key(&m.id()),
            Self::Workout(w) => Workout::key(&w.id()),
            Self::Exercise(e) => Exercise::key(&e.id()),
        }
    }
}

impl From<MeasurementSet> for RemoteEntity {
    fn from(value: MeasurementSet) -> Self {
        Self::MeasurementSet(value)
    }
}

impl From<Workout> for RemoteEntity {
    fn from(value: Workout) -> Self {
        Self::Workout(value)
    }
}

impl From<Exercise> for RemoteEntity {
    fn from(value: Exercise) -> Self {
        Self::Exercise(value)
    }
}

/// One entry of the server's change log.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// Created or replaced.
    Put(RemoteEntity),
    /// Measurement set deleted.
    DeleteMeasurementSet(MeasurementDate),
    /// Workout deleted.
    DeleteWorkout(Uuid),
    /// Exercise deleted.
    DeleteExercise(ExerciseId),
}

impl RemoteChange {
    fn slot(&self) -> (EntityKind, String) {
        match self {
            Self::Put(entity) => (entity.kind(), entity.key()),
            Self::DeleteMeasurementSet(date) => (EntityKind::MeasurementSet, date.to_string()),
            Self::DeleteWorkout(id) => (EntityKind::Workout, id.to_string()),
            Self::DeleteExercise(id) => (EntityKind::Exercise, id.to_string()),
        }
    }

    fn from_payload(payload: &StagedPayload) -> Self {
        match payload {
            StagedPayload::MeasurementSet { date, value } => match value {
                Staged::Value(m) => Self::Put(m.clone().into()),
                Staged::Deleted => Self::DeleteMeasurementSet(date.clone()),
            },
            StagedPayload::Workout { workout_id, value } => match value {
                Staged::Value(w) => Self::Put(w.clone().into()),
                Staged::Deleted => Self::DeleteWorkout(*workout_id),
            },
            StagedPayload::Exercise { id, value } => match value {
                Staged::Value(e) => Self::Put(e.clone().into()),
                Staged::Deleted => Self::DeleteExercise(*id),
            },
        }
    }
}

/// A scripted failure, consumed by the next matching request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// `409`.
    Conflict,
    /// `503` with an optional `Retry-After`.
    Busy(Option<Duration>),
    /// `401`.
    Unauthenticated,
    /// Connection dropped.
    Transport,
    /// Any other status.
    Server(u16),
}

impl Failure {
    fn into_error(self) -> SyncError {
        match self {
            Failure::Conflict => SyncError::VersionConflict,
            Failure::Busy(retry_after) => SyncError::WriteLockBusy { retry_after },
            Failure::Unauthenticated => SyncError::Unauthenticated,
            Failure::Transport => SyncError::transport_retryable("connection reset"),
            Failure::Server(status) => SyncError::ServerError {
                status,
                message: "scripted failure".into(),
            },
        }
    }
}

/// A request the server received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `GET /user?since=`.
    Pull {
        /// Requested base version.
        since: u64,
    },
    /// `PUT` or `DELETE` on an entity.
    Upload {
        /// Entity path.
        route: String,
        /// Version the change was made against.
        version: u64,
        /// `DELETE` rather than `PUT`.
        deletion: bool,
    },
}

#[derive(Debug, Default)]
struct ServerState {
    version: u64,
    log: Vec<(u64, RemoteChange)>,
    current: BTreeMap<(EntityKind, String), RemoteEntity>,
    pull_failures: VecDeque<Failure>,
    upload_failures: VecDeque<Failure>,
    requests: Vec<Request>,
}

impl ServerState {
    fn apply(&mut self, change: RemoteChange) -> u64 {
        self.version += 1;
        let slot = change.slot();
        match &change {
            RemoteChange::Put(entity) => {
                self.current.insert(slot, entity.clone());
            }
            _ => {
                self.current.remove(&slot);
            }
        }
        self.log.push((self.version, change));
        self.version
    }

    fn changes_since(&self, since: u64) -> UserChanges {
        let mut latest: BTreeMap<(EntityKind, String), &RemoteChange> = BTreeMap::new();
        for (version, change) in &self.log {
            if *version > since {
                latest.insert(change.slot(), change);
            }
        }

        let mut changes = UserChanges::at_version(self.version);
        for change in latest.into_values() {
            match change {
                RemoteChange::Put(RemoteEntity::MeasurementSet(m)) => {
                    changes.measurement_sets.push(m.clone())
                }
                RemoteChange::Put(RemoteEntity::Workout(w)) => changes.workouts.push(w.clone()),
                RemoteChange::Put(RemoteEntity::Exercise(e)) => changes.exercises.push(e.clone()),
                RemoteChange::DeleteMeasurementSet(date) => {
                    changes.deleted_measurement_sets.push(date.clone())
                }
                RemoteChange::DeleteWorkout(id) => changes.deleted_workouts.push(*id),
                RemoteChange::DeleteExercise(id) => changes.deleted_exercises.push(*id),
            }
        }
        changes
    }
}

/// A versioned server held in memory.
///
/// Uploads are accepted only against the current version and bump it by
/// one; pulls return the latest state of everything touched after the
/// requested version. Other clients are simulated with
/// [`FakeRemote::remote_put`] and [`FakeRemote::remote_delete`].
#[derive(Debug, Default)]
pub struct FakeRemote {
    state: Mutex<ServerState>,
}

impl FakeRemote {
    /// An empty server at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current server version.
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Another client writes an entity. Returns the new version.
    pub fn remote_put(&self, entity: impl Into<RemoteEntity>) -> u64 {
        self.state.lock().apply(RemoteChange::Put(entity.into()))
    }

    /// Another client deletes an entity. Returns the new version.
    pub fn remote_delete(&self, change: RemoteChange) -> u64 {
        self.state.lock().apply(change)
    }

    /// The server's copy of an entity.
    pub fn get(&self, kind: EntityKind, key: &str) -> Option<RemoteEntity> {
        self.state
            .lock()
            .current
            .get(&(kind, key.to_string()))
            .cloned()
    }

    /// Number of live entities on the server.
    pub fn entity_count(&self) -> usize {
        self.state.lock().current.len()
    }

    /// Fails the next pull with `failure`.
    pub fn fail_next_pull(&self, failure: Failure) {
        self.state.lock().pull_failures.push_back(failure);
    }

    /// Fails the next upload with `failure`.
    pub fn fail_next_upload(&self, failure: Failure) {
        self.state.lock().upload_failures.push_back(failure);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    /// Number of upload requests received, failed ones included.
    pub fn upload_count(&self) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| matches!(r, Request::Upload { .. }))
            .count()
    }

    /// Number of pull requests received, failed ones included.
    pub fn pull_count(&self) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| matches!(r, Request::Pull { .. }))
            .count()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn changes_since(&self, version: u64) -> SyncResult<UserChanges> {
        let mut state = self.state.lock();
        state.requests.push(Request::Pull { since: version });
        if let Some(failure) = state.pull_failures.pop_front() {
            return Err(failure.into_error());
        }
        Ok(state.changes_since(version))
    }

    async fn upload(&self, change: &StagedChange) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.requests.push(Request::Upload {
            route: change.payload.route(),
            version: change.version,
            deletion: change.payload.is_deletion(),
        });
        if let Some(failure) = state.upload_failures.pop_front() {
            return Err(failure.into_error());
        }
        if change.version != state.version {
            return Err(SyncError::VersionConflict);
        }
        state.apply(RemoteChange::from_payload(&change.payload));
        Ok(())
    }
}
