//! Reopening databases over journals left behind by earlier handles.

use gymlog_core::wal::WalRecord;
use gymlog_core::{
    Config, CoreError, Database, IndexDef, Schema, SequenceNumber, TableDef, TableReader,
    TransactionId,
};
use gymlog_storage::{InMemoryBackend, StorageBackend};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::tempdir;

fn first_word(value: &[u8]) -> Option<String> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.split_whitespace().next())
        .map(str::to_string)
}

fn schema() -> Schema {
    Schema::new()
        .with_table(TableDef::new("version"))
        .with_table(TableDef::new("exercise").with_index(IndexDef::new("type", first_word)))
}

fn reopen(raw: &InMemoryBackend) -> Database {
    Database::open_with_backend(Config::default(), schema(), Box::new(raw.shared())).unwrap()
}

#[test]
fn committed_state_survives_reopen() {
    let raw = InMemoryBackend::new();
    {
        let db = reopen(&raw);
        db.transaction(|t| {
            t.put("version", "version", vec![7])?;
            t.put("exercise", "a#1", b"treadmill 5k".to_vec())
        })
        .unwrap();
        db.transaction(|t| t.put("exercise", "a#2", b"treadmill 2k".to_vec()))
            .unwrap();
        db.transaction(|t| t.delete("exercise", "a#1")).unwrap();
    }

    let db = reopen(&raw);
    let read = db.read().unwrap();
    assert_eq!(read.sequence(), SequenceNumber(3));
    assert_eq!(read.get("version", "version").unwrap(), Some(vec![7]));
    let treadmill = read.index_scan("exercise", "type", "treadmill").unwrap();
    assert_eq!(treadmill.len(), 1);
    assert_eq!(treadmill[0].0, "a#2");
    assert_eq!(db.stats().recovered_transactions, 3);
}

#[test]
fn transaction_without_commit_is_ignored() {
    let raw = InMemoryBackend::new();
    {
        let db = reopen(&raw);
        db.transaction(|t| t.put("version", "version", vec![1]))
            .unwrap();
    }

    let txid = TransactionId(99);
    let mut bytes = Vec::new();
    for record in [
        WalRecord::Begin { txid },
        WalRecord::Put {
            txid,
            table: "version".into(),
            key: "version".into(),
            value: vec![2],
        },
    ] {
        record.encode_into(&mut bytes).unwrap();
    }
    raw.shared().append(&bytes).unwrap();

    let db = reopen(&raw);
    assert_eq!(
        db.read().unwrap().get("version", "version").unwrap(),
        Some(vec![1])
    );

    // the next transaction id must not collide with the abandoned one
    let txn = db.begin_write().unwrap();
    assert!(txn.id() > txid);
}

#[test]
fn torn_commit_is_rolled_back_and_trimmed() {
    let raw = InMemoryBackend::new();
    {
        let db = reopen(&raw);
        db.transaction(|t| t.put("version", "version", vec![1]))
            .unwrap();
        db.transaction(|t| t.put("version", "version", vec![2]))
            .unwrap();
    }
    let full = raw.data();
    let mut torn = raw.shared();
    torn.truncate(full.len() as u64 - 5).unwrap();

    let db = reopen(&raw);
    assert_eq!(
        db.read().unwrap().get("version", "version").unwrap(),
        Some(vec![1])
    );
    db.transaction(|t| t.put("version", "version", vec![3]))
        .unwrap();
    drop(db);

    let db = reopen(&raw);
    assert_eq!(
        db.read().unwrap().get("version", "version").unwrap(),
        Some(vec![3])
    );
}

#[test]
fn flipped_byte_refuses_to_open() {
    let raw = InMemoryBackend::new();
    {
        let db = reopen(&raw);
        db.transaction(|t| t.put("version", "version", vec![1]))
            .unwrap();
    }
    let mut bytes = raw.data();
    bytes[20] ^= 0xFF;

    let err = Database::open_with_backend(
        Config::default(),
        schema(),
        Box::new(InMemoryBackend::with_data(bytes)),
    )
    .unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn rows_of_dropped_tables_are_skipped() {
    let raw = InMemoryBackend::new();
    {
        let wide = schema().with_table(TableDef::new("legacy"));
        let db =
            Database::open_with_backend(Config::default(), wide, Box::new(raw.shared())).unwrap();
        db.transaction(|t| {
            t.put("legacy", "x", vec![1])?;
            t.put("version", "version", vec![4])
        })
        .unwrap();
    }
    let db = reopen(&raw);
    assert_eq!(
        db.read().unwrap().get("version", "version").unwrap(),
        Some(vec![4])
    );
}

#[test]
fn checkpoint_then_reopen() {
    let raw = InMemoryBackend::new();
    {
        let db = reopen(&raw);
        for i in 0..10u8 {
            db.transaction(|t| t.put("exercise", &format!("w#{i}"), b"seated-row".to_vec()))
                .unwrap();
        }
        db.transaction(|t| t.delete("exercise", "w#0")).unwrap();
        db.checkpoint().unwrap();
        db.transaction(|t| t.put("version", "version", vec![11]))
            .unwrap();
    }

    let db = reopen(&raw);
    let read = db.read().unwrap();
    assert_eq!(read.sequence(), SequenceNumber(12));
    assert_eq!(read.len("exercise").unwrap(), 9);
    assert_eq!(
        read.index_scan("exercise", "type", "seated-row").unwrap().len(),
        9
    );
}

#[test]
fn automatic_checkpoint_bounds_journal() {
    let raw = InMemoryBackend::new();
    let config = Config::default().checkpoint_threshold(512);
    let db = Database::open_with_backend(config, schema(), Box::new(raw.shared())).unwrap();
    for i in 0..200u32 {
        db.transaction(|t| t.put("version", "version", i.to_le_bytes().to_vec()))
            .unwrap();
    }
    assert!(db.stats().checkpoints > 0);
    assert!(db.journal_size().unwrap() < 1024);
    drop(db);

    let db = reopen(&raw);
    assert_eq!(
        db.read().unwrap().get("version", "version").unwrap(),
        Some(199u32.to_le_bytes().to_vec())
    );
}

#[test]
fn on_disk_database_reopens_and_locks() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");
    {
        let db = Database::open(&path, schema()).unwrap();
        assert!(matches!(
            Database::open(&path, schema()),
            Err(CoreError::DatabaseLocked)
        ));
        db.transaction(|t| t.put("version", "version", vec![5]))
            .unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
    }
    let db = Database::open(&path, schema()).unwrap();
    assert_eq!(
        db.read().unwrap().get("version", "version").unwrap(),
        Some(vec![5])
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn replay_matches_a_model(ops in prop::collection::vec((0u8..6, prop::option::of(any::<u8>())), 1..40)) {
        let raw = InMemoryBackend::new();
        let mut model = BTreeMap::new();
        {
            let db = reopen(&raw);
            for (key, value) in &ops {
                let key = format!("k{key}");
                db.transaction(|t| match value {
                    Some(v) => t.put("version", &key, vec![*v]),
                    None => t.delete("version", &key),
                }).unwrap();
                match value {
                    Some(v) => { model.insert(key, vec![*v]); }
                    None => { model.remove(&key); }
                }
            }
        }
        let db = reopen(&raw);
        let rows: BTreeMap<String, Vec<u8>> = db.read().unwrap().scan("version").unwrap().into_iter().collect();
        prop_assert_eq!(rows, model);
    }
}
