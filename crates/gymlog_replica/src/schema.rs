//! Table layout of the replica.

use gymlog_core::{codec, IndexDef, Schema, TableDef};
use gymlog_model::{EntityKind, Exercise, Staged};

/// Table holding the refresh token.
pub const AUTH_TABLE: &str = "auth";
/// Table holding the canonical version register.
pub const VERSION_TABLE: &str = "version";
/// Index over exercise type, on both exercise tables.
pub const TYPE_INDEX: &str = "type";

pub(crate) const VERSION_KEY: &str = "version";
pub(crate) const REFRESH_TOKEN_KEY: &str = "refresh_token";

fn canonical_exercise_type(value: &[u8]) -> Option<String> {
    codec::decode::<Exercise>(value)
        .ok()
        .map(|e| e.exercise_type.as_str().to_string())
}

fn staged_exercise_type(value: &[u8]) -> Option<String> {
    match codec::decode::<Staged<Exercise>>(value).ok()? {
        Staged::Value(e) => Some(e.exercise_type.as_str().to_string()),
        Staged::Deleted => None,
    }
}

/// Schema of the replica database.
pub fn replica_schema() -> Schema {
    let mut schema = Schema::new()
        .with_table(TableDef::new(AUTH_TABLE))
        .with_table(TableDef::new(VERSION_TABLE));
    for kind in EntityKind::SCAN_ORDER {
        let (mut canonical, mut staged) = (
            TableDef::new(kind.canonical_table()),
            TableDef::new(kind.staged_table()),
        );
        if kind == EntityKind::Exercise {
            canonical = canonical.with_index(IndexDef::new(TYPE_INDEX, canonical_exercise_type));
            staged = staged.with_index(IndexDef::new(TYPE_INDEX, staged_exercise_type));
        }
        schema = schema.with_table(canonical).with_table(staged);
    }
    schema
}
