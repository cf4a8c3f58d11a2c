//! Folding a remote changeset into the replica.

use crate::error::ReplicaResult;
use crate::store::{load_canonical, load_staged, load_version, put_encoded, put_version, LocalStore};
use gymlog_core::WriteTransaction;
use gymlog_model::{
    Conflict, Exercise, MeasurementSet, MergeConflict, Record, Resolution, Resolutions, Staged,
    UserChanges, Workout,
};
use tracing::{debug, info, warn};

impl LocalStore {
    /// Applies a remote changeset to the canonical tables.
    ///
    /// Staged entries the changeset makes redundant are cleared. An entity
    /// changed on both sides in different ways is a conflict unless
    /// `resolutions` settles it. If any conflict remains, nothing is written
    /// and every conflict is returned; calling again with those conflicts
    /// resolved makes progress.
    ///
    /// The version register never moves backward: a changeset older than the
    /// stored version still merges its entities but leaves the register alone.
    pub fn merge(
        &self,
        changes: &UserChanges,
        resolutions: &Resolutions,
    ) -> ReplicaResult<Vec<MergeConflict>> {
        let mut txn = self.database().begin_write()?;

        let current = load_version(&txn)?;
        if changes.version > current {
            put_version(&mut txn, changes.version)?;
        } else if changes.version < current {
            warn!(
                remote = changes.version,
                local = current,
                "changeset is older than the local version"
            );
        }

        let mut conflicts = Vec::new();
        merge_kind::<MeasurementSet>(
            &mut txn,
            &changes.measurement_sets,
            &changes.deleted_measurement_sets,
            resolutions,
            &mut conflicts,
        )?;
        merge_kind::<Workout>(
            &mut txn,
            &changes.workouts,
            &changes.deleted_workouts,
            resolutions,
            &mut conflicts,
        )?;
        merge_kind::<Exercise>(
            &mut txn,
            &changes.exercises,
            &changes.deleted_exercises,
            resolutions,
            &mut conflicts,
        )?;

        if !conflicts.is_empty() {
            debug!(conflicts = conflicts.len(), "merge rolled back");
            txn.abort();
            return Ok(conflicts);
        }

        let writes = txn.write_count();
        txn.commit()?;
        info!(
            version = changes.version.max(current),
            changes = changes.change_count(),
            writes,
            "merged remote changes"
        );
        Ok(conflicts)
    }
}

fn merge_kind<T: Record>(
    txn: &mut WriteTransaction<'_>,
    updated: &[T],
    deleted: &[T::Id],
    resolutions: &Resolutions,
    conflicts: &mut Vec<MergeConflict>,
) -> ReplicaResult<()> {
    let canonical_table = T::KIND.canonical_table();
    let staged_table = T::KIND.staged_table();

    for remote in updated {
        let id = remote.id();
        let key = T::key(&id);
        let original = Staged::from(load_canonical::<T, _>(&*txn, &key)?);
        put_encoded(txn, canonical_table, &key, remote)?;

        let Some(local) = load_staged::<T, _>(&*txn, &key)? else {
            continue;
        };
        let resolution = resolutions.get(&key);
        let clear = resolution == Some(Resolution::Remote)
            || matches!(&local, Staged::Value(value) if value.same_content(remote));
        if clear {
            debug!(kind = %T::KIND, %key, "remote update supersedes staged change");
            txn.delete(staged_table, &key)?;
        } else if resolution.is_none() {
            conflicts.push(T::merge_conflict(Conflict {
                id,
                original,
                remote: Staged::Value(remote.clone()),
                local,
            }));
        }
    }

    for id in deleted {
        let key = T::key(id);
        let original = Staged::from(load_canonical::<T, _>(&*txn, &key)?);
        if !original.is_deleted() {
            txn.delete(canonical_table, &key)?;
        }

        let Some(local) = load_staged::<T, _>(&*txn, &key)? else {
            continue;
        };
        let resolution = resolutions.get(&key);
        if local.is_deleted() || resolution == Some(Resolution::Remote) {
            debug!(kind = %T::KIND, %key, "remote delete supersedes staged change");
            txn.delete(staged_table, &key)?;
        } else if resolution.is_none() {
            conflicts.push(T::merge_conflict(Conflict {
                id: id.clone(),
                original,
                remote: Staged::Deleted,
                local,
            }));
        }
    }
    Ok(())
}
