//! Staged command implementation.

use gymlog_model::{Exercise, MeasurementSet, Record, StagedPayload, Workout};
use gymlog_replica::{LocalStore, ReplicaResult};
use serde::Serialize;
use std::io::Write;

/// One pending change as printed.
#[derive(Debug, Serialize)]
pub struct StagedRow {
    /// Server path the change would be sent to.
    pub route: String,
    /// `DELETE` rather than `PUT`.
    pub deletion: bool,
    /// The change itself.
    pub payload: StagedPayload,
}

fn rows_of<T: Record>(store: &LocalStore, rows: &mut Vec<StagedRow>) -> ReplicaResult<()> {
    for (id, staged) in store.staged_entries::<T>()? {
        let payload = T::staged_payload(id, staged);
        rows.push(StagedRow {
            route: payload.route(),
            deletion: payload.is_deletion(),
            payload,
        });
    }
    Ok(())
}

/// Every staged entry, in upload order.
///
/// Entries that no longer differ from canonical are included; they are
/// dropped on the next upload pass.
pub fn staged_rows(store: &LocalStore) -> ReplicaResult<Vec<StagedRow>> {
    let mut rows = Vec::new();
    rows_of::<MeasurementSet>(store, &mut rows)?;
    rows_of::<Workout>(store, &mut rows)?;
    rows_of::<Exercise>(store, &mut rows)?;
    Ok(rows)
}

/// Runs the staged command.
pub fn run(store: &LocalStore, out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    let rows = staged_rows(store)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
    Ok(())
}
