//! Journal parsing.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{
    compute_crc32, WalRecord, WalRecordType, CRC_SIZE, HEADER_SIZE, WAL_MAGIC, WAL_VERSION,
};

/// The parsed contents of a journal.
#[derive(Debug, Default)]
pub struct Journal {
    /// Whole records with the offset each starts at.
    pub records: Vec<(u64, WalRecord)>,
    /// Length of the prefix made of whole records.
    ///
    /// Smaller than the input when the last append was torn.
    pub valid_len: u64,
}

impl Journal {
    /// Returns true if the input ended with a partial record.
    #[must_use]
    pub fn has_torn_tail(&self, total_len: u64) -> bool {
        self.valid_len < total_len
    }
}

/// Parses every record in `bytes`.
///
/// # Errors
///
/// Fails on bad magic, an unknown version or type, a checksum mismatch or a
/// malformed payload. A partial record at the very end is not an error.
pub fn read_journal(bytes: &[u8]) -> CoreResult<Journal> {
    let mut journal = Journal::default();
    let mut pos = 0usize;

    while bytes.len() - pos >= HEADER_SIZE {
        let offset = pos as u64;
        let header = &bytes[pos..pos + HEADER_SIZE];

        if header[..4] != WAL_MAGIC {
            return Err(CoreError::corruption(offset, "bad magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > WAL_VERSION {
            return Err(CoreError::corruption(
                offset,
                format!("unsupported record version {version}"),
            ));
        }
        let record_type = WalRecordType::from_byte(header[6]).ok_or_else(|| {
            CoreError::corruption(offset, format!("unknown record type {}", header[6]))
        })?;
        let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let Some(end) = (pos + HEADER_SIZE)
            .checked_add(len)
            .and_then(|n| n.checked_add(CRC_SIZE))
            .filter(|end| *end <= bytes.len())
        else {
            break;
        };

        let body_end = end - CRC_SIZE;
        let expected = u32::from_le_bytes([
            bytes[body_end],
            bytes[body_end + 1],
            bytes[body_end + 2],
            bytes[body_end + 3],
        ]);
        let actual = compute_crc32(&bytes[pos..body_end]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        let payload = &bytes[pos + HEADER_SIZE..body_end];
        let record = WalRecord::decode_payload(record_type, payload, offset)?;
        journal.records.push((offset, record));
        pos = end;
    }

    journal.valid_len = pos as u64;
    Ok(journal)
}
