//! Database handle, commit path and recovery.

use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::schema::Schema;
use crate::snapshot::Snapshot;
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::transaction::{PendingWrite, ReadTransaction, WriteTransaction};
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::{Journal, Wal, WalRecord};
use gymlog_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An open key-value database.
///
/// Committed state is an immutable snapshot behind a lock; a commit builds
/// the next snapshot, appends it to the journal and swaps it in. Readers
/// holding an older snapshot keep seeing it.
///
/// ```rust
/// use gymlog_core::{Database, Schema, TableDef, TableReader};
///
/// let db = Database::open_in_memory(Schema::new().with_table(TableDef::new("auth"))).unwrap();
/// let before = db.read().unwrap();
///
/// let mut txn = db.begin_write().unwrap();
/// txn.put("auth", "refresh_token", b"abc".to_vec()).unwrap();
/// txn.commit().unwrap();
///
/// assert!(!before.contains("auth", "refresh_token").unwrap());
/// assert!(db.read().unwrap().contains("auth", "refresh_token").unwrap());
/// ```
pub struct Database {
    config: Config,
    schema: Schema,
    dir: Option<DatabaseDir>,
    wal: Wal,
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    next_txid: AtomicU64,
    stats: DatabaseStats,
    open: AtomicBool,
}

impl Database {
    /// Opens or creates the database directory at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DatabaseLocked`] if another process has it open
    /// - [`CoreError::LogCorruption`] or [`CoreError::ChecksumMismatch`] if
    ///   the journal is damaged
    pub fn open(path: &Path, schema: Schema) -> CoreResult<Self> {
        Self::open_with_config(path, schema, Config::default())
    }

    /// Opens the database directory at `path` with custom options.
    pub fn open_with_config(path: &Path, schema: Schema, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.journal_path())?;
        Self::build(config, schema, Some(dir), Box::new(backend))
    }

    /// Opens a database whose journal lives in `backend`.
    pub fn open_with_backend(
        config: Config,
        schema: Schema,
        backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        Self::build(config, schema, None, backend)
    }

    /// Opens an empty database that lives only in memory.
    pub fn open_in_memory(schema: Schema) -> CoreResult<Self> {
        Self::open_with_backend(
            Config::default().sync_on_commit(false),
            schema,
            Box::new(InMemoryBackend::new()),
        )
    }

    fn build(
        config: Config,
        schema: Schema,
        dir: Option<DatabaseDir>,
        backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        let wal = Wal::new(backend, config.sync_on_commit);
        let journal = wal.recover()?;
        let (snapshot, max_txid, replayed) = replay(&schema, journal)?;

        let stats = DatabaseStats::default();
        stats.record_recovered(replayed);
        info!(
            sequence = snapshot.sequence.as_u64(),
            rows = snapshot.row_count(),
            replayed,
            "database opened"
        );

        Ok(Self {
            config,
            schema,
            dir,
            wal,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
            next_txid: AtomicU64::new(max_txid + 1),
            stats,
            open: AtomicBool::new(true),
        })
    }

    /// Returns the schema the database was opened with.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the options the database was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the directory for on-disk databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DatabaseDir::path)
    }

    /// Returns a snapshot of the latest committed state.
    pub fn read(&self) -> CoreResult<ReadTransaction> {
        self.ensure_open()?;
        Ok(ReadTransaction::new(Arc::clone(&self.current.read())))
    }

    /// Starts the write transaction, waiting for the current one to finish.
    pub fn begin_write(&self) -> CoreResult<WriteTransaction<'_>> {
        self.ensure_open()?;
        let writer = self.writer.lock();
        let base = Arc::clone(&self.current.read());
        let id = TransactionId(self.next_txid.fetch_add(1, Ordering::SeqCst));
        Ok(WriteTransaction::new(self, writer, id, base))
    }

    /// Runs `f` in a write transaction.
    ///
    /// Commits if `f` returns `Ok`, aborts if it returns `Err`.
    pub fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        let mut txn = self.begin_write()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.abort();
                Err(err)
            }
        }
    }

    /// Rewrites the journal as a single transaction holding the live rows.
    pub fn checkpoint(&self) -> CoreResult<()> {
        self.ensure_open()?;
        let _writer = self.writer.lock();
        self.checkpoint_locked()
    }

    /// Returns the sequence number of the latest commit.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.current.read().sequence
    }

    /// Returns the number of rows across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.current.read().row_count()
    }

    /// Returns the journal size in bytes.
    pub fn journal_size(&self) -> CoreResult<u64> {
        self.wal.size()
    }

    /// Returns the engine counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Syncs the journal and rejects further operations.
    pub fn close(&self) -> CoreResult<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            let _writer = self.writer.lock();
            self.wal.sync()?;
            debug!("database closed");
        }
        Ok(())
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    /// Journals and publishes `writes`. The caller holds the writer lock.
    pub(crate) fn commit_writes(
        &self,
        txid: TransactionId,
        base: &Snapshot,
        writes: BTreeMap<(&'static str, String), PendingWrite>,
    ) -> CoreResult<SequenceNumber> {
        self.ensure_open()?;
        if writes.is_empty() {
            return Ok(base.sequence);
        }

        let sequence = base.sequence.next();
        let mut next = base.clone();
        let mut records = Vec::with_capacity(writes.len() + 2);
        let (mut puts, mut deletes) = (0u64, 0u64);

        records.push(WalRecord::Begin { txid });
        for ((table, key), write) in writes {
            let def = self
                .schema
                .table(table)
                .ok_or_else(|| CoreError::unknown_table(table))?;
            match write {
                PendingWrite::Put(value) => {
                    records.push(WalRecord::Put {
                        txid,
                        table: table.to_string(),
                        key: key.clone(),
                        value: value.clone(),
                    });
                    next.table_mut(table)?.put(def, key, value);
                    puts += 1;
                }
                PendingWrite::Delete => {
                    records.push(WalRecord::Delete {
                        txid,
                        table: table.to_string(),
                        key: key.clone(),
                    });
                    next.table_mut(table)?.delete(def, &key);
                    deletes += 1;
                }
            }
        }
        records.push(WalRecord::Commit { txid, sequence });

        let before = self.wal.size()?;
        self.wal.append_batch(&records)?;
        let after = self.wal.size()?;

        next.sequence = sequence;
        *self.current.write() = Arc::new(next);
        self.stats
            .record_commit(puts, deletes, after.saturating_sub(before));
        debug!(%txid, %sequence, puts, deletes, "committed");

        let threshold = self.config.checkpoint_threshold;
        if threshold > 0 && after >= threshold {
            self.checkpoint_locked()?;
        }
        Ok(sequence)
    }

    pub(crate) fn record_abort(&self, txid: TransactionId, writes: usize) {
        self.stats.record_abort();
        debug!(%txid, writes, "aborted");
    }

    fn checkpoint_locked(&self) -> CoreResult<()> {
        let snapshot = Arc::clone(&self.current.read());
        let txid = TransactionId(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let sequence = snapshot.sequence;

        let mut records = vec![
            WalRecord::Checkpoint { sequence },
            WalRecord::Begin { txid },
        ];
        for (table, data) in snapshot.tables() {
            for (key, value) in &data.rows {
                records.push(WalRecord::Put {
                    txid,
                    table: table.to_string(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        records.push(WalRecord::Commit { txid, sequence });

        self.wal.replace(&records)?;
        self.stats.record_checkpoint();
        info!(%sequence, rows = records.len() - 3, "journal compacted");
        Ok(())
    }
}

/// Rebuilds committed state from a parsed journal.
///
/// Returns the snapshot, the largest transaction id seen and the number of
/// transactions applied.
fn replay(schema: &Schema, journal: Journal) -> CoreResult<(Snapshot, u64, u64)> {
    let mut snapshot = Snapshot::empty(schema);
    let mut open: HashMap<TransactionId, Vec<WalRecord>> = HashMap::new();
    let mut max_txid = 0u64;
    let mut applied = 0u64;

    for (offset, record) in journal.records {
        if let Some(txid) = record.txid() {
            max_txid = max_txid.max(txid.as_u64());
        }
        match record {
            WalRecord::Begin { txid } => {
                open.insert(txid, Vec::new());
            }
            WalRecord::Commit { txid, sequence } => {
                let ops = open
                    .remove(&txid)
                    .ok_or_else(|| CoreError::corruption(offset, "commit without begin"))?;
                apply(schema, &mut snapshot, ops)?;
                snapshot.sequence = sequence;
                applied += 1;
            }
            WalRecord::Abort { txid } => {
                open.remove(&txid);
            }
            WalRecord::Checkpoint { sequence } => {
                snapshot.sequence = sequence;
            }
            write => {
                let ops = write
                    .txid()
                    .and_then(|txid| open.get_mut(&txid))
                    .ok_or_else(|| CoreError::corruption(offset, "write outside a transaction"))?;
                ops.push(write);
            }
        }
    }

    if !open.is_empty() {
        debug!(
            discarded = open.len(),
            "ignoring transactions without a commit record"
        );
    }
    Ok((snapshot, max_txid, applied))
}

fn apply(schema: &Schema, snapshot: &mut Snapshot, ops: Vec<WalRecord>) -> CoreResult<()> {
    for op in ops {
        let (table, key, value) = match op {
            WalRecord::Put {
                table, key, value, ..
            } => (table, key, Some(value)),
            WalRecord::Delete { table, key, .. } => (table, key, None),
            _ => continue,
        };
        let Some(def) = schema.table(&table) else {
            warn!(%table, "skipping journal record for a table missing from the schema");
            continue;
        };
        let data = snapshot.table_mut(def.name())?;
        match value {
            Some(value) => data.put(def, key, value),
            None => data.delete(def, &key),
        }
    }
    Ok(())
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("sequence", &self.sequence())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(%err, "failed to sync journal on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexDef, TableDef};
    use crate::transaction::TableReader;

    fn kind(value: &[u8]) -> Option<String> {
        std::str::from_utf8(value)
            .ok()
            .and_then(|s| s.split('|').next())
            .map(str::to_string)
    }

    fn schema() -> Schema {
        Schema::new()
            .with_table(TableDef::new("workout"))
            .with_table(TableDef::new("exercise").with_index(IndexDef::new("type", kind)))
    }

    fn db() -> Database {
        Database::open_in_memory(schema()).unwrap()
    }

    #[test]
    fn committed_writes_are_visible() {
        let db = db();
        let mut txn = db.begin_write().unwrap();
        txn.put("workout", "w1", b"legs".to_vec()).unwrap();
        assert_eq!(txn.get("workout", "w1").unwrap(), Some(b"legs".to_vec()));
        assert_eq!(txn.commit().unwrap(), SequenceNumber(1));

        let read = db.read().unwrap();
        assert_eq!(read.get("workout", "w1").unwrap(), Some(b"legs".to_vec()));
        assert_eq!(read.sequence(), SequenceNumber(1));
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let db = db();
        db.transaction(|t| t.put("workout", "w1", b"v1".to_vec()))
            .unwrap();
        let old = db.read().unwrap();
        db.transaction(|t| {
            t.put("workout", "w1", b"v2".to_vec())?;
            t.put("workout", "w2", b"new".to_vec())
        })
        .unwrap();

        assert_eq!(old.get("workout", "w1").unwrap(), Some(b"v1".to_vec()));
        assert!(!old.contains("workout", "w2").unwrap());
        assert_eq!(db.read().unwrap().len("workout").unwrap(), 2);
    }

    #[test]
    fn abort_and_drop_discard_writes() {
        let db = db();
        let mut txn = db.begin_write().unwrap();
        txn.put("workout", "w1", vec![1]).unwrap();
        txn.abort();

        {
            let mut txn = db.begin_write().unwrap();
            txn.put("workout", "w2", vec![2]).unwrap();
        }

        assert_eq!(db.read().unwrap().len("workout").unwrap(), 0);
        assert_eq!(db.stats().aborts, 2);
        assert_eq!(db.sequence(), SequenceNumber(0));
    }

    #[test]
    fn closure_error_rolls_back() {
        let db = db();
        let result: CoreResult<()> = db.transaction(|t| {
            t.put("workout", "w1", vec![1])?;
            Err(CoreError::invalid_operation("changed my mind"))
        });
        assert!(result.is_err());
        assert!(!db.read().unwrap().contains("workout", "w1").unwrap());
    }

    #[test]
    fn empty_commit_leaves_journal_alone() {
        let db = db();
        let txn = db.begin_write().unwrap();
        assert_eq!(txn.commit().unwrap(), SequenceNumber(0));
        assert_eq!(db.journal_size().unwrap(), 0);
    }

    #[test]
    fn unknown_table_is_rejected() {
        let db = db();
        let mut txn = db.begin_write().unwrap();
        assert!(matches!(
            txn.put("measurement", "2024-01-01", vec![]),
            Err(CoreError::UnknownTable { .. })
        ));
        assert!(db.read().unwrap().get("measurement", "x").is_err());
    }

    #[test]
    fn scans_merge_pending_writes() {
        let db = db();
        db.transaction(|t| {
            t.put("workout", "a", vec![1])?;
            t.put("workout", "b", vec![2])?;
            t.put("workout", "c", vec![3])
        })
        .unwrap();

        let mut txn = db.begin_write().unwrap();
        txn.delete("workout", "b").unwrap();
        txn.put("workout", "bb", vec![4]).unwrap();
        let keys: Vec<String> = txn
            .scan("workout")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, ["a", "bb", "c"]);

        let prefixed = txn.scan_prefix("workout", "b").unwrap();
        assert_eq!(prefixed, vec![("bb".to_string(), vec![4])]);
    }

    #[test]
    fn index_scan_sees_pending_writes() {
        let db = db();
        db.transaction(|t| {
            t.put("exercise", "e1", b"treadmill|5km".to_vec())?;
            t.put("exercise", "e2", b"seated-row|3x10".to_vec())
        })
        .unwrap();

        let mut txn = db.begin_write().unwrap();
        txn.put("exercise", "e1", b"biceps-curl|3x8".to_vec()).unwrap();
        txn.put("exercise", "e3", b"treadmill|2km".to_vec()).unwrap();
        let rows = txn.index_scan("exercise", "type", "treadmill").unwrap();
        assert_eq!(rows, vec![("e3".to_string(), b"treadmill|2km".to_vec())]);
        txn.commit().unwrap();

        let read = db.read().unwrap();
        let keys: Vec<String> = read
            .index_scan("exercise", "type", "biceps-curl")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, ["e1"]);
        assert!(matches!(
            read.index_scan("exercise", "order", "1"),
            Err(CoreError::UnknownIndex { .. })
        ));
    }

    #[test]
    fn inverted_range_is_empty() {
        let db = db();
        db.transaction(|t| t.put("workout", "m", vec![])).unwrap();
        let read = db.read().unwrap();
        let rows = read
            .scan_range(
                "workout",
                std::ops::Bound::Included("z"),
                std::ops::Bound::Excluded("a"),
            )
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn closed_database_rejects_work() {
        let db = db();
        db.close().unwrap();
        assert!(matches!(db.read(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.begin_write(), Err(CoreError::DatabaseClosed)));
    }

    #[test]
    fn checkpoint_keeps_rows_and_shrinks_journal() {
        let db = db();
        for i in 0..20 {
            db.transaction(|t| t.put("workout", "w", vec![i])).unwrap();
        }
        let before = db.journal_size().unwrap();
        db.checkpoint().unwrap();
        assert!(db.journal_size().unwrap() < before);
        assert_eq!(db.read().unwrap().get("workout", "w").unwrap(), Some(vec![19]));
        assert_eq!(db.stats().checkpoints, 1);
    }
}
