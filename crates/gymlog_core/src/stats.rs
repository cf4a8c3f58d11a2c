//! Engine counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated as the database is used.
///
/// All counters are monotonic and can be read while writes are running.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    commits: AtomicU64,
    aborts: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
    journal_bytes: AtomicU64,
    checkpoints: AtomicU64,
    recovered_transactions: AtomicU64,
}

impl DatabaseStats {
    pub(crate) fn record_commit(&self, puts: u64, deletes: u64, bytes: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.puts.fetch_add(puts, Ordering::Relaxed);
        self.deletes.fetch_add(deletes, Ordering::Relaxed);
        self.journal_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_checkpoint(&self) {
        self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recovered(&self, transactions: u64) {
        self.recovered_transactions
            .fetch_add(transactions, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            journal_bytes: self.journal_bytes.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
            recovered_transactions: self.recovered_transactions.load(Ordering::Relaxed),
        }
    }
}

/// A copy of [`DatabaseStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Transactions committed with at least one write.
    pub commits: u64,
    /// Transactions aborted or dropped.
    pub aborts: u64,
    /// Rows written.
    pub puts: u64,
    /// Rows deleted.
    pub deletes: u64,
    /// Bytes appended to the journal since open.
    pub journal_bytes: u64,
    /// Checkpoints taken since open.
    pub checkpoints: u64,
    /// Transactions replayed when the database was opened.
    pub recovered_transactions: u64,
}
