//! Replicas for tests.

use gymlog_replica::LocalStore;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A replica that cleans up after itself.
///
/// Derefs to [`LocalStore`]; [`TestStore::shared`] hands out the `Arc` the
/// sync crate wants.
#[derive(Debug)]
pub struct TestStore {
    store: Arc<LocalStore>,
    dir: Option<TempDir>,
}

impl TestStore {
    /// A replica held in memory.
    pub fn in_memory() -> Self {
        match LocalStore::open_in_memory() {
            Ok(store) => Self {
                store: Arc::new(store),
                dir: None,
            },
            Err(err) => panic!("in-memory replica: {err}"),
        }
    }

    /// A replica in a fresh temporary directory.
    pub fn on_disk() -> Self {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => panic!("temporary directory: {err}"),
        };
        let store = open(&dir.path().join("replica"));
        Self {
            store: Arc::new(store),
            dir: Some(dir),
        }
    }

    /// Closes and reopens an on-disk replica.
    ///
    /// Panics for in-memory replicas or while other `Arc`s are alive.
    pub fn reopen(self) -> Self {
        let Self { store, dir } = self;
        let Some(dir) = dir else {
            panic!("only on-disk replicas can be reopened");
        };
        if Arc::try_unwrap(store).is_err() {
            panic!("replica still shared");
        }
        let store = open(&dir.path().join("replica"));
        Self {
            store: Arc::new(store),
            dir: Some(dir),
        }
    }

    /// A shared handle to the replica.
    pub fn shared(&self) -> Arc<LocalStore> {
        Arc::clone(&self.store)
    }

    /// Directory of an on-disk replica.
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.path().join("replica"))
    }
}

fn open(path: &Path) -> LocalStore {
    match LocalStore::open(path) {
        Ok(store) => store,
        Err(err) => panic!("open replica at {}: {err}", path.display()),
    }
}

impl Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &LocalStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::workout;

    #[test]
    fn on_disk_store_reopens() {
        let store = TestStore::on_disk();
        store.stage_upsert(&workout(1, "kept")).unwrap();
        let store = store.reopen();
        assert_eq!(store.staged_count().unwrap(), 1);
        assert!(store.path().is_some());
    }
}
