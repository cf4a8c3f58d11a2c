//! The replica handle, staging and canonical accessors.

use crate::error::ReplicaResult;
use crate::schema::{replica_schema, AUTH_TABLE, REFRESH_TOKEN_KEY, VERSION_KEY, VERSION_TABLE};
use gymlog_core::{codec, Config, Database, TableReader, WriteTransaction};
use gymlog_model::{EntityKind, Record, Staged};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// The local replica of one account.
///
/// Every operation runs in its own transaction, so a handle can be shared
/// between threads behind an `Arc`.
pub struct LocalStore {
    db: Database,
}

impl LocalStore {
    /// Opens or creates a replica in the directory at `path`.
    pub fn open(path: &Path) -> ReplicaResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a replica with engine settings.
    pub fn open_with_config(path: &Path, config: Config) -> ReplicaResult<Self> {
        let db = Database::open_with_config(path, replica_schema(), config)?;
        Ok(Self { db })
    }

    /// Creates a replica that lives only in memory.
    pub fn open_in_memory() -> ReplicaResult<Self> {
        let db = Database::open_in_memory(replica_schema())?;
        Ok(Self { db })
    }

    /// Wraps an already open database.
    ///
    /// The database must have been opened with [`replica_schema`].
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The canonical version register; 0 before the first sync.
    pub fn version(&self) -> ReplicaResult<u64> {
        load_version(&self.db.read()?)
    }

    // staging

    /// Stages a local create or edit, replacing any earlier staged change.
    pub fn stage_upsert<T: Record>(&self, item: &T) -> ReplicaResult<()> {
        item.validate()?;
        let key = T::key(&item.id());
        debug!(kind = %T::KIND, %key, "staging upsert");
        self.db.transaction(|txn| {
            put_encoded(txn, T::KIND.staged_table(), &key, &Staged::Value(item))
        })
    }

    /// Stages a local deletion.
    ///
    /// An entity the server never saw needs no upload, so the staged entry
    /// is dropped instead of replaced by a tombstone.
    pub fn stage_delete<T: Record>(&self, id: &T::Id) -> ReplicaResult<()> {
        let key = T::key(id);
        self.db.transaction(|txn| {
            if txn.contains(T::KIND.canonical_table(), &key)? {
                debug!(kind = %T::KIND, %key, "staging delete");
                put_encoded(txn, T::KIND.staged_table(), &key, &Staged::<T>::Deleted)
            } else {
                debug!(kind = %T::KIND, %key, "dropping unsynced entity");
                txn.delete(T::KIND.staged_table(), &key)?;
                Ok(())
            }
        })
    }

    /// The staged change for `id`, if any.
    pub fn staged<T: Record>(&self, id: &T::Id) -> ReplicaResult<Option<Staged<T>>> {
        load_staged(&self.db.read()?, &T::key(id))
    }

    /// Every staged change of one kind, in key order.
    pub fn staged_entries<T: Record>(&self) -> ReplicaResult<Vec<(T::Id, Staged<T>)>> {
        self.db
            .read()?
            .scan(T::KIND.staged_table())?
            .into_iter()
            .map(|(key, bytes)| -> ReplicaResult<_> {
                Ok((T::parse_id(&key)?, codec::decode(&bytes)?))
            })
            .collect()
    }

    /// Number of staged changes across every kind.
    pub fn staged_count(&self) -> ReplicaResult<usize> {
        let read = self.db.read()?;
        let mut count = 0;
        for kind in EntityKind::SCAN_ORDER {
            count += read.len(kind.staged_table())?;
        }
        Ok(count)
    }

    // canonical

    /// The server-confirmed copy of `id`, if any.
    pub fn canonical<T: Record>(&self, id: &T::Id) -> ReplicaResult<Option<T>> {
        load_canonical(&self.db.read()?, &T::key(id))
    }

    /// Every server-confirmed entity of one kind, in key order.
    pub fn canonical_entries<T: Record>(&self) -> ReplicaResult<Vec<T>> {
        self.db
            .read()?
            .scan(T::KIND.canonical_table())?
            .into_iter()
            .map(|(_, bytes)| -> ReplicaResult<T> { Ok(codec::decode(&bytes)?) })
            .collect()
    }

    // auth

    /// The stored refresh token.
    pub fn refresh_token(&self) -> ReplicaResult<Option<String>> {
        load(&self.db.read()?, AUTH_TABLE, REFRESH_TOKEN_KEY)
    }

    /// Stores a refresh token, replacing any earlier one.
    pub fn set_refresh_token(&self, token: &str) -> ReplicaResult<()> {
        self.db
            .transaction(|txn| put_encoded(txn, AUTH_TABLE, REFRESH_TOKEN_KEY, token))
    }

    /// Forgets the refresh token.
    pub fn clear_refresh_token(&self) -> ReplicaResult<()> {
        self.db.transaction(|txn| {
            txn.delete(AUTH_TABLE, REFRESH_TOKEN_KEY)?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").field("db", &self.db).finish()
    }
}

pub(crate) fn load<V: DeserializeOwned, R: TableReader + ?Sized>(
    reader: &R,
    table: &str,
    key: &str,
) -> ReplicaResult<Option<V>> {
    match reader.get(table, key)? {
        Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn load_version<R: TableReader + ?Sized>(reader: &R) -> ReplicaResult<u64> {
    Ok(load(reader, VERSION_TABLE, VERSION_KEY)?.unwrap_or(0))
}

pub(crate) fn load_canonical<T: Record, R: TableReader + ?Sized>(
    reader: &R,
    key: &str,
) -> ReplicaResult<Option<T>> {
    load(reader, T::KIND.canonical_table(), key)
}

pub(crate) fn load_staged<T: Record, R: TableReader + ?Sized>(
    reader: &R,
    key: &str,
) -> ReplicaResult<Option<Staged<T>>> {
    load(reader, T::KIND.staged_table(), key)
}

pub(crate) fn put_encoded<V: Serialize + ?Sized>(
    txn: &mut WriteTransaction<'_>,
    table: &str,
    key: &str,
    value: &V,
) -> ReplicaResult<()> {
    txn.put(table, key, codec::encode(value)?)?;
    Ok(())
}

pub(crate) fn put_version(txn: &mut WriteTransaction<'_>, version: u64) -> ReplicaResult<()> {
    put_encoded(txn, VERSION_TABLE, VERSION_KEY, &version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymlog_model::{
        Exercise, ExerciseId, ExerciseType, MeasurementDate, MeasurementSet, MeasurementType,
        RepetitionSet, SetList, Workout,
    };
    use uuid::Uuid;

    fn store() -> LocalStore {
        LocalStore::open_in_memory().unwrap()
    }

    fn seed_canonical<T: Record>(store: &LocalStore, item: &T) {
        store
            .database()
            .transaction(|txn| {
                put_encoded(txn, T::KIND.canonical_table(), &T::key(&item.id()), item)
            })
            .unwrap();
    }

    #[test]
    fn fresh_store_is_empty() {
        let store = store();
        assert_eq!(store.version().unwrap(), 0);
        assert_eq!(store.staged_count().unwrap(), 0);
        assert_eq!(store.refresh_token().unwrap(), None);
    }

    #[test]
    fn staging_the_same_upsert_twice_is_idempotent() {
        let store = store();
        let workout = Workout::new(Uuid::new_v4()).with_notes("push");
        store.stage_upsert(&workout).unwrap();
        let once = store.staged_entries::<Workout>().unwrap();
        store.stage_upsert(&workout).unwrap();
        assert_eq!(store.staged_entries::<Workout>().unwrap(), once);
        assert_eq!(store.staged_count().unwrap(), 1);
    }

    #[test]
    fn create_then_delete_leaves_nothing_staged() {
        let store = store();
        let date = MeasurementDate::parse("2024-06-01").unwrap();
        store
            .stage_upsert(&MeasurementSet::new(date.clone()).with(MeasurementType::Weight, 70.0))
            .unwrap();
        store.stage_delete::<MeasurementSet>(&date).unwrap();
        assert_eq!(store.staged::<MeasurementSet>(&date).unwrap(), None);
        assert_eq!(store.staged_count().unwrap(), 0);
    }

    #[test]
    fn deleting_a_synced_entity_stages_a_tombstone() {
        let store = store();
        let workout = Workout::new(Uuid::new_v4());
        seed_canonical(&store, &workout);
        store.stage_delete::<Workout>(&workout.workout_id).unwrap();
        assert_eq!(
            store.staged::<Workout>(&workout.workout_id).unwrap(),
            Some(Staged::Deleted)
        );
        assert_eq!(
            store.canonical::<Workout>(&workout.workout_id).unwrap(),
            Some(workout)
        );
    }

    #[test]
    fn invalid_exercise_is_not_staged() {
        let store = store();
        let id = ExerciseId::new(Uuid::new_v4(), Uuid::new_v4());
        let exercise = Exercise::new(id, ExerciseType::Treadmill, 0).with_sets(
            SetList::Repetition(vec![RepetitionSet {
                set_id: Uuid::new_v4(),
                repetitions: 10,
                resistance: 5,
            }]),
        );
        assert!(store.stage_upsert(&exercise).is_err());
        assert_eq!(store.staged_count().unwrap(), 0);
    }

    #[test]
    fn refresh_token_lifecycle() {
        let store = store();
        store.set_refresh_token("abc").unwrap();
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("abc"));
        store.set_refresh_token("def").unwrap();
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("def"));
        store.clear_refresh_token().unwrap();
        assert_eq!(store.refresh_token().unwrap(), None);
    }

    #[test]
    fn entries_come_back_in_key_order() {
        let store = store();
        let mut ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            store.stage_upsert(&Workout::new(*id)).unwrap();
            seed_canonical(&store, &Workout::new(*id));
        }
        ids.sort();
        let staged: Vec<Uuid> = store
            .staged_entries::<Workout>()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(staged, ids);
        let canonical: Vec<Uuid> = store
            .canonical_entries::<Workout>()
            .unwrap()
            .into_iter()
            .map(|w| w.workout_id)
            .collect();
        assert_eq!(canonical, ids);
    }
}
