//! Journal writer.

use crate::error::CoreResult;
use crate::wal::reader::{read_journal, Journal};
use crate::wal::record::WalRecord;
use gymlog_storage::StorageBackend;
use parking_lot::Mutex;

/// Appends records to a storage backend.
///
/// A transaction is written as a single `append` so a crash can tear at most
/// the last transaction, which recovery then ignores for lack of a `Commit`.
pub struct Wal {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl Wal {
    /// Wraps `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends `records` as one write and makes them durable.
    ///
    /// Returns the offset of the first record.
    pub fn append_batch(&self, records: &[WalRecord]) -> CoreResult<u64> {
        let bytes = encode_all(records)?;
        let mut backend = self.backend.lock();
        let offset = backend.append(&bytes)?;
        backend.flush()?;
        if self.sync_on_commit {
            backend.sync()?;
        }
        Ok(offset)
    }

    /// Replaces the whole journal with `records`.
    pub fn replace(&self, records: &[WalRecord]) -> CoreResult<()> {
        let bytes = encode_all(records)?;
        self.backend.lock().replace(&bytes)?;
        Ok(())
    }

    /// Parses the journal and cuts off a torn tail if there is one.
    pub fn recover(&self) -> CoreResult<Journal> {
        let mut backend = self.backend.lock();
        let bytes = backend.read_all()?;
        let journal = read_journal(&bytes)?;
        if journal.has_torn_tail(bytes.len() as u64) {
            tracing::warn!(
                valid = journal.valid_len,
                total = bytes.len(),
                "dropping torn journal tail"
            );
            backend.truncate(journal.valid_len)?;
        }
        Ok(journal)
    }

    /// Returns the journal size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Flushes and syncs the backend.
    pub fn sync(&self) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

fn encode_all(records: &[WalRecord]) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for record in records {
        record.encode_into(&mut bytes)?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SequenceNumber, TransactionId};
    use gymlog_storage::InMemoryBackend;

    fn commit(txid: u64, key: &str) -> Vec<WalRecord> {
        let txid = TransactionId(txid);
        vec![
            WalRecord::Begin { txid },
            WalRecord::Put {
                txid,
                table: "workout".into(),
                key: key.into(),
                value: key.as_bytes().to_vec(),
            },
            WalRecord::Commit {
                txid,
                sequence: SequenceNumber(txid.0),
            },
        ]
    }

    #[test]
    fn batches_append_in_order() {
        let wal = Wal::new(Box::new(InMemoryBackend::new()), false);
        assert_eq!(wal.append_batch(&commit(1, "a")).unwrap(), 0);
        assert!(wal.append_batch(&commit(2, "b")).unwrap() > 0);
        assert_eq!(wal.recover().unwrap().records.len(), 6);
    }

    #[test]
    fn recover_truncates_torn_tail() {
        let backend = InMemoryBackend::new();
        let raw = backend.shared();
        let wal = Wal::new(Box::new(backend), true);
        wal.append_batch(&commit(1, "a")).unwrap();
        let good = wal.size().unwrap();

        let mut torn = raw.shared();
        torn.append(&[b'G', b'L', b'O', b'G', 1, 0]).unwrap();

        let journal = wal.recover().unwrap();
        assert_eq!(journal.records.len(), 3);
        assert_eq!(wal.size().unwrap(), good);
    }

    #[test]
    fn replace_drops_history() {
        let wal = Wal::new(Box::new(InMemoryBackend::new()), false);
        wal.append_batch(&commit(1, "a")).unwrap();
        wal.append_batch(&commit(2, "b")).unwrap();
        wal.replace(&commit(3, "c")).unwrap();
        let journal = wal.recover().unwrap();
        assert_eq!(journal.records.len(), 3);
        assert_eq!(journal.records[0].1.txid(), Some(TransactionId(3)));
    }
}
