//! On-disk layout.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK          # advisory lock held while open
//! └─ journal.log   # write-ahead journal
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";

/// An opened database directory.
///
/// Holds an exclusive lock on `LOCK` so a second process cannot open the
/// same store. The lock is released on drop.
#[derive(Debug)]
pub(crate) struct DatabaseDir {
    path: PathBuf,
    lock: File,
}

impl DatabaseDir {
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(CoreError::invalid_operation(format!(
                    "database directory {} does not exist",
                    path.display()
                )));
            }
            fs::create_dir_all(path)?;
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        lock.try_lock_exclusive()
            .map_err(|_| CoreError::DatabaseLocked)?;

        Ok(Self {
            path: path.to_path_buf(),
            lock,
        })
    }

    pub(crate) fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DatabaseDir {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
    }
}
