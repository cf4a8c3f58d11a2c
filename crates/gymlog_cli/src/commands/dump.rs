//! Dump command implementation.

use gymlog_model::{EntityKind, Exercise, MeasurementSet, Record, Workout};
use gymlog_replica::LocalStore;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// Which copy of an entity kind a table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Canonical,
    Staged,
}

fn resolve(table: &str) -> Option<(EntityKind, Side)> {
    EntityKind::SCAN_ORDER.into_iter().find_map(|kind| {
        if kind.canonical_table() == table {
            Some((kind, Side::Canonical))
        } else if kind.staged_table() == table {
            Some((kind, Side::Staged))
        } else {
            None
        }
    })
}

#[derive(Serialize)]
struct Row<V> {
    key: String,
    value: V,
}

fn rows_of<T: Record>(store: &LocalStore, side: Side) -> Result<Vec<Value>, DumpError> {
    let mut rows = Vec::new();
    match side {
        Side::Canonical => {
            for value in store.canonical_entries::<T>()? {
                let key = T::key(&value.id());
                rows.push(serde_json::to_value(Row { key, value })?);
            }
        }
        Side::Staged => {
            for (id, value) in store.staged_entries::<T>()? {
                let key = T::key(&id);
                rows.push(serde_json::to_value(Row { key, value })?);
            }
        }
    }
    Ok(rows)
}

type DumpError = Box<dyn std::error::Error>;

/// The rows of an entity table as JSON values, in key order.
pub fn dump_table(store: &LocalStore, table: &str) -> Result<Vec<Value>, DumpError> {
    let (kind, side) = resolve(table).ok_or_else(|| {
        let names: Vec<&str> = EntityKind::SCAN_ORDER
            .iter()
            .flat_map(|k| [k.canonical_table(), k.staged_table()])
            .collect();
        format!("Unknown table {table:?}; expected one of {}", names.join(", "))
    })?;
    let rows = match kind {
        EntityKind::MeasurementSet => rows_of::<MeasurementSet>(store, side)?,
        EntityKind::Workout => rows_of::<Workout>(store, side)?,
        EntityKind::Exercise => rows_of::<Exercise>(store, side)?,
    };
    Ok(rows)
}

/// Runs the dump command.
pub fn run(
    store: &LocalStore,
    table: &str,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows = dump_table(store, table)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymlog_model::{Resolutions, UserChanges};
    use gymlog_testkit::fixtures::{uuid, workout};
    use gymlog_testkit::TestStore;

    #[test]
    fn dumps_canonical_and_staged_tables() {
        let store = TestStore::in_memory();
        let changes = UserChanges {
            workouts: vec![workout(1, "synced")],
            ..UserChanges::at_version(1)
        };
        assert!(store.merge(&changes, &Resolutions::new()).unwrap().is_empty());
        store.stage_delete::<Workout>(&uuid(1)).unwrap();

        let canonical = dump_table(&store, "workout").unwrap();
        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0]["key"], uuid(1).to_string());
        assert_eq!(canonical[0]["value"]["notes"], "synced");

        let staged = dump_table(&store, "staged_workout").unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0]["value"], "Deleted");
    }

    #[test]
    fn unknown_tables_are_rejected() {
        let store = TestStore::in_memory();
        let err = dump_table(&store, "auth").unwrap_err();
        assert!(err.to_string().contains("staged_measurement"));
    }
}
