//! Upload bookkeeping: picking the next staged change and recording a
//! successful upload.

use crate::error::ReplicaResult;
use crate::store::{load_canonical, load_staged, load_version, put_encoded, put_version, LocalStore};
use gymlog_core::{codec, TableReader, WriteTransaction};
use gymlog_model::{
    EntityKind, Exercise, MeasurementSet, Record, Staged, StagedChange, StagedPayload, Workout,
};
use tracing::{debug, warn};

impl LocalStore {
    /// Returns the next staged change that still needs uploading.
    ///
    /// Staged tables are visited in [`EntityKind::SCAN_ORDER`], each in key
    /// order. Entries that no longer differ from canonical (a tombstone for
    /// an entity canonical no longer has, or an edit equal to canonical) are
    /// deleted on the way. The returned change carries the canonical version
    /// it was read against.
    pub fn next_staged_change(&self) -> ReplicaResult<Option<StagedChange>> {
        let mut txn = self.database().begin_write()?;
        let version = load_version(&txn)?;

        let mut found = None;
        for kind in EntityKind::SCAN_ORDER {
            found = match kind {
                EntityKind::MeasurementSet => next_of_kind::<MeasurementSet>(&mut txn)?,
                EntityKind::Workout => next_of_kind::<Workout>(&mut txn)?,
                EntityKind::Exercise => next_of_kind::<Exercise>(&mut txn)?,
            };
            if found.is_some() {
                break;
            }
        }

        // reconciled entries are dropped even when a change is returned
        txn.commit()?;
        Ok(found.map(|payload| StagedChange::new(version, payload)))
    }

    /// Records that the server accepted `change`.
    ///
    /// Bumps the version register by one and applies the change to the
    /// canonical tables. The staged entry is cleared only if it still holds
    /// what was uploaded; a newer local edit stays staged. Returns the new
    /// version.
    pub fn apply_upload(&self, change: &StagedChange) -> ReplicaResult<u64> {
        let version = self.database().transaction(|txn| -> ReplicaResult<u64> {
            let version = load_version(&*txn)? + 1;
            put_version(txn, version)?;
            match &change.payload {
                StagedPayload::MeasurementSet { date, value } => {
                    apply_kind::<MeasurementSet>(txn, date, value)?
                }
                StagedPayload::Workout { workout_id, value } => {
                    apply_kind::<Workout>(txn, workout_id, value)?
                }
                StagedPayload::Exercise { id, value } => apply_kind::<Exercise>(txn, id, value)?,
            }
            Ok(version)
        })?;
        if change.version + 1 != version {
            warn!(
                uploaded_against = change.version,
                version, "version register moved during upload"
            );
        }
        debug!(kind = %change.kind(), key = %change.id(), version, "upload applied");
        Ok(version)
    }
}

fn next_of_kind<T: Record>(txn: &mut WriteTransaction<'_>) -> ReplicaResult<Option<StagedPayload>> {
    let staged_table = T::KIND.staged_table();
    for (key, bytes) in txn.scan(staged_table)? {
        let staged: Staged<T> = codec::decode(&bytes)?;
        let canonical = load_canonical::<T, _>(&*txn, &key)?;
        let pending = match (&staged, &canonical) {
            (Staged::Deleted, None) => false,
            (Staged::Value(local), Some(current)) => !local.same_content(current),
            _ => true,
        };
        if pending {
            return Ok(Some(T::staged_payload(T::parse_id(&key)?, staged)));
        }
        debug!(kind = %T::KIND, %key, "dropping staged no-op");
        txn.delete(staged_table, &key)?;
    }
    Ok(None)
}

fn apply_kind<T: Record>(
    txn: &mut WriteTransaction<'_>,
    id: &T::Id,
    uploaded: &Staged<T>,
) -> ReplicaResult<()> {
    let key = T::key(id);
    let staged_table = T::KIND.staged_table();
    let current = load_staged::<T, _>(&*txn, &key)?;

    match uploaded {
        Staged::Deleted => {
            txn.delete(T::KIND.canonical_table(), &key)?;
            if matches!(current, Some(Staged::Deleted)) {
                txn.delete(staged_table, &key)?;
            }
        }
        Staged::Value(item) => {
            put_encoded(txn, T::KIND.canonical_table(), &key, item)?;
            match current {
                // deleted locally while the upload was in flight
                None => put_encoded(txn, staged_table, &key, &Staged::<T>::Deleted)?,
                Some(Staged::Value(local)) if local.same_content(item) => {
                    txn.delete(staged_table, &key)?;
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}
