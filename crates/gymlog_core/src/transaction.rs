//! Read and write transactions.

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::schema::TableDef;
use crate::snapshot::{Snapshot, TableData};
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::MutexGuard;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Ordered read access to tables.
///
/// Implemented by both transaction kinds so code that only reads can run
/// against a snapshot or inside a write transaction alike.
pub trait TableReader {
    /// Returns the value stored under `key`.
    fn get(&self, table: &str, key: &str) -> CoreResult<Option<Vec<u8>>>;

    /// Returns the rows with keys in the given bounds, ascending by key.
    fn scan_range(
        &self,
        table: &str,
        lower: Bound<&str>,
        upper: Bound<&str>,
    ) -> CoreResult<Vec<(String, Vec<u8>)>>;

    /// Returns the rows whose `index` key equals `value`, ascending by
    /// primary key.
    fn index_scan(
        &self,
        table: &str,
        index: &str,
        value: &str,
    ) -> CoreResult<Vec<(String, Vec<u8>)>>;

    /// Returns true if `key` is present.
    fn contains(&self, table: &str, key: &str) -> CoreResult<bool> {
        Ok(self.get(table, key)?.is_some())
    }

    /// Returns every row, ascending by key.
    fn scan(&self, table: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        self.scan_range(table, Bound::Unbounded, Bound::Unbounded)
    }

    /// Returns the rows whose key starts with `prefix`, ascending by key.
    fn scan_prefix(&self, table: &str, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        let upper = prefix_upper_bound(prefix);
        let upper = match &upper {
            Some(bound) => Bound::Excluded(bound.as_str()),
            None => Bound::Unbounded,
        };
        self.scan_range(table, Bound::Included(prefix), upper)
    }

    /// Returns the number of rows.
    fn len(&self, table: &str) -> CoreResult<usize> {
        Ok(self.scan(table)?.len())
    }
}

/// Smallest string greater than every string starting with `prefix`.
///
/// `None` means there is no such bound and a prefix scan runs to the end.
#[must_use]
pub fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut next = last as u32 + 1;
        // skip the surrogate gap
        if (0xD800..=0xDFFF).contains(&next) {
            next = 0xE000;
        }
        if let Some(c) = char::from_u32(next) {
            chars.push(c);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

fn in_bounds(key: &str, lower: Bound<&str>, upper: Bound<&str>) -> bool {
    let above = match lower {
        Bound::Included(l) => key >= l,
        Bound::Excluded(l) => key > l,
        Bound::Unbounded => true,
    };
    let below = match upper {
        Bound::Included(u) => key <= u,
        Bound::Excluded(u) => key < u,
        Bound::Unbounded => true,
    };
    above && below
}

fn owned_bound(bound: Bound<&str>) -> Bound<String> {
    match bound {
        Bound::Included(s) => Bound::Included(s.to_string()),
        Bound::Excluded(s) => Bound::Excluded(s.to_string()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn range_of(
    table: &TableData,
    lower: Bound<&str>,
    upper: Bound<&str>,
) -> Vec<(String, Vec<u8>)> {
    // BTreeMap::range panics on inverted bounds
    if let (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) =
        (lower, upper)
    {
        if l > u || (l == u && !matches!((lower, upper), (Bound::Included(_), Bound::Included(_))))
        {
            return Vec::new();
        }
    }
    table
        .rows
        .range::<String, _>((owned_bound(lower), owned_bound(upper)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn index_rows(
    table_name: &str,
    table: &TableData,
    index: &str,
    value: &str,
) -> CoreResult<Vec<(String, Vec<u8>)>> {
    if !table.indexes.contains_key(index) {
        return Err(CoreError::UnknownIndex {
            table: table_name.to_string(),
            index: index.to_string(),
        });
    }
    Ok(table
        .index_keys(index, value)
        .filter_map(|key| table.rows.get(key).map(|v| (key.to_string(), v.clone())))
        .collect())
}

/// A consistent view of the database as of one commit.
///
/// Later commits are not visible. Holding a read transaction never blocks
/// writers.
#[derive(Debug, Clone)]
pub struct ReadTransaction {
    snapshot: Arc<Snapshot>,
}

impl ReadTransaction {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// Returns the sequence number this view was taken at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.snapshot.sequence
    }

    /// Iterates the rows of `table` lazily, ascending by key.
    pub fn rows(&self, table: &str) -> CoreResult<impl Iterator<Item = (&str, &[u8])> + '_> {
        Ok(self
            .snapshot
            .table(table)?
            .rows
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice())))
    }
}

impl TableReader for ReadTransaction {
    fn get(&self, table: &str, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.snapshot.table(table)?.rows.get(key).cloned())
    }

    fn scan_range(
        &self,
        table: &str,
        lower: Bound<&str>,
        upper: Bound<&str>,
    ) -> CoreResult<Vec<(String, Vec<u8>)>> {
        Ok(range_of(self.snapshot.table(table)?, lower, upper))
    }

    fn index_scan(
        &self,
        table: &str,
        index: &str,
        value: &str,
    ) -> CoreResult<Vec<(String, Vec<u8>)>> {
        index_rows(table, self.snapshot.table(table)?, index, value)
    }

    fn len(&self, table: &str) -> CoreResult<usize> {
        Ok(self.snapshot.table(table)?.rows.len())
    }
}

/// A write buffered in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingWrite {
    Put(Vec<u8>),
    Delete,
}

/// The single active writer.
///
/// Reads see the committed state the transaction started from plus its own
/// buffered writes. Nothing is visible to other readers until
/// [`commit`](Self::commit). Dropping the transaction without committing
/// discards its writes.
pub struct WriteTransaction<'db> {
    db: &'db Database,
    _writer: MutexGuard<'db, ()>,
    id: TransactionId,
    base: Arc<Snapshot>,
    writes: BTreeMap<(&'static str, String), PendingWrite>,
    finished: bool,
}

impl<'db> WriteTransaction<'db> {
    pub(crate) fn new(
        db: &'db Database,
        writer: MutexGuard<'db, ()>,
        id: TransactionId,
        base: Arc<Snapshot>,
    ) -> Self {
        Self {
            db,
            _writer: writer,
            id,
            base,
            writes: BTreeMap::new(),
            finished: false,
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the number of buffered writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    fn table_def(&self, table: &str) -> CoreResult<&'db TableDef> {
        self.db
            .schema()
            .table(table)
            .ok_or_else(|| CoreError::unknown_table(table))
    }

    /// Stores `value` under `key`.
    pub fn put(&mut self, table: &str, key: &str, value: Vec<u8>) -> CoreResult<()> {
        let name = self.table_def(table)?.name();
        self.writes
            .insert((name, key.to_string()), PendingWrite::Put(value));
        Ok(())
    }

    /// Removes `key`. Deleting a missing key is not an error.
    pub fn delete(&mut self, table: &str, key: &str) -> CoreResult<()> {
        let name = self.table_def(table)?.name();
        self.writes
            .insert((name, key.to_string()), PendingWrite::Delete);
        Ok(())
    }

    fn pending_in<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a PendingWrite)> + 'a {
        self.writes
            .iter()
            .filter(move |((t, _), _)| *t == table)
            .map(|((_, key), write)| (key.as_str(), write))
    }

    /// Writes this transaction to the journal and publishes it.
    ///
    /// Returns the sequence number of the new snapshot. A transaction with
    /// no writes commits without touching the journal.
    pub fn commit(mut self) -> CoreResult<SequenceNumber> {
        self.finished = true;
        let writes = std::mem::take(&mut self.writes);
        self.db.commit_writes(self.id, &self.base, writes)
    }

    /// Discards every buffered write.
    pub fn abort(mut self) {
        self.finished = true;
        self.db.record_abort(self.id, self.writes.len());
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.db.record_abort(self.id, self.writes.len());
        }
    }
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("id", &self.id)
            .field("base", &self.base.sequence)
            .field("writes", &self.writes.len())
            .finish()
    }
}

impl TableReader for WriteTransaction<'_> {
    fn get(&self, table: &str, key: &str) -> CoreResult<Option<Vec<u8>>> {
        let name = self.table_def(table)?.name();
        match self.writes.get(&(name, key.to_string())) {
            Some(PendingWrite::Put(value)) => Ok(Some(value.clone())),
            Some(PendingWrite::Delete) => Ok(None),
            None => Ok(self.base.table(table)?.rows.get(key).cloned()),
        }
    }

    fn scan_range(
        &self,
        table: &str,
        lower: Bound<&str>,
        upper: Bound<&str>,
    ) -> CoreResult<Vec<(String, Vec<u8>)>> {
        let mut rows: BTreeMap<String, Vec<u8>> =
            range_of(self.base.table(table)?, lower, upper).into_iter().collect();
        for (key, write) in self.pending_in(table) {
            if !in_bounds(key, lower, upper) {
                continue;
            }
            match write {
                PendingWrite::Put(value) => {
                    rows.insert(key.to_string(), value.clone());
                }
                PendingWrite::Delete => {
                    rows.remove(key);
                }
            }
        }
        Ok(rows.into_iter().collect())
    }

    fn index_scan(
        &self,
        table: &str,
        index: &str,
        value: &str,
    ) -> CoreResult<Vec<(String, Vec<u8>)>> {
        let def = self.table_def(table)?;
        let index_def = def.index(index).ok_or_else(|| CoreError::UnknownIndex {
            table: table.to_string(),
            index: index.to_string(),
        })?;
        let mut rows: BTreeMap<String, Vec<u8>> =
            index_rows(table, self.base.table(table)?, index, value)?
                .into_iter()
                .collect();
        for (key, write) in self.pending_in(table) {
            match write {
                PendingWrite::Put(bytes) if index_def.key_for(bytes).as_deref() == Some(value) => {
                    rows.insert(key.to_string(), bytes.clone());
                }
                _ => {
                    rows.remove(key);
                }
            }
        }
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_bound_increments_last_char() {
        assert_eq!(prefix_upper_bound("abc#").as_deref(), Some("abc$"));
        assert_eq!(prefix_upper_bound("").as_deref(), None);
        assert_eq!(
            prefix_upper_bound("a\u{10FFFF}").as_deref(),
            Some("b")
        );
    }

    #[test]
    fn bounds_check() {
        assert!(in_bounds("b", Bound::Included("b"), Bound::Excluded("c")));
        assert!(!in_bounds("c", Bound::Included("b"), Bound::Excluded("c")));
        assert!(!in_bounds("b", Bound::Excluded("b"), Bound::Unbounded));
    }
}
