//! Journal records and their binary form.

use crate::error::{CoreError, CoreResult};
use crate::types::{SequenceNumber, TransactionId};

/// Magic bytes opening every record.
pub const WAL_MAGIC: [u8; 4] = *b"GLOG";

/// Current record format version.
pub const WAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

/// Record type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// Start of a transaction.
    Begin = 1,
    /// Insert or overwrite a row.
    Put = 2,
    /// Remove a row.
    Delete = 3,
    /// End of a committed transaction.
    Commit = 4,
    /// End of an abandoned transaction.
    Abort = 5,
    /// Start of a compacted journal.
    Checkpoint = 6,
}

impl WalRecordType {
    /// Parses a type tag.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            1 => Self::Begin,
            2 => Self::Put,
            3 => Self::Delete,
            4 => Self::Commit,
            5 => Self::Abort,
            6 => Self::Checkpoint,
            _ => return None,
        })
    }
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Start of a transaction.
    Begin {
        /// Transaction.
        txid: TransactionId,
    },
    /// Insert or overwrite a row.
    Put {
        /// Transaction.
        txid: TransactionId,
        /// Table name.
        table: String,
        /// Row key.
        key: String,
        /// Row bytes.
        value: Vec<u8>,
    },
    /// Remove a row.
    Delete {
        /// Transaction.
        txid: TransactionId,
        /// Table name.
        table: String,
        /// Row key.
        key: String,
    },
    /// The transaction committed as `sequence`.
    Commit {
        /// Transaction.
        txid: TransactionId,
        /// Snapshot sequence produced by the commit.
        sequence: SequenceNumber,
    },
    /// The transaction was abandoned.
    Abort {
        /// Transaction.
        txid: TransactionId,
    },
    /// The journal was compacted at `sequence`.
    Checkpoint {
        /// Sequence of the compacted snapshot.
        sequence: SequenceNumber,
    },
}

impl WalRecord {
    /// Returns the type tag.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Begin { .. } => WalRecordType::Begin,
            Self::Put { .. } => WalRecordType::Put,
            Self::Delete { .. } => WalRecordType::Delete,
            Self::Commit { .. } => WalRecordType::Commit,
            Self::Abort { .. } => WalRecordType::Abort,
            Self::Checkpoint { .. } => WalRecordType::Checkpoint,
        }
    }

    /// Returns the owning transaction, if any.
    #[must_use]
    pub fn txid(&self) -> Option<TransactionId> {
        match self {
            Self::Begin { txid }
            | Self::Put { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Commit { txid, .. }
            | Self::Abort { txid } => Some(*txid),
            Self::Checkpoint { .. } => None,
        }
    }

    /// Appends the framed record to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> CoreResult<()> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_operation("journal record larger than 4 GiB"))?;

        let start = out.len();
        out.extend_from_slice(&WAL_MAGIC);
        out.extend_from_slice(&WAL_VERSION.to_le_bytes());
        out.push(self.record_type() as u8);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&payload);
        let crc = compute_crc32(&out[start..]);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(())
    }

    fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Begin { txid } | Self::Abort { txid } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
            }
            Self::Put {
                txid,
                table,
                key,
                value,
            } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                put_bytes(&mut buf, table.as_bytes())?;
                put_bytes(&mut buf, key.as_bytes())?;
                put_bytes(&mut buf, value)?;
            }
            Self::Delete { txid, table, key } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                put_bytes(&mut buf, table.as_bytes())?;
                put_bytes(&mut buf, key.as_bytes())?;
            }
            Self::Commit { txid, sequence } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
            Self::Checkpoint { sequence } => {
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
        }
        Ok(buf)
    }

    /// Parses a record payload. `offset` is only used in error messages.
    pub fn decode_payload(
        record_type: WalRecordType,
        payload: &[u8],
        offset: u64,
    ) -> CoreResult<Self> {
        let mut p = Payload {
            bytes: payload,
            pos: 0,
            offset,
        };
        let record = match record_type {
            WalRecordType::Begin => Self::Begin {
                txid: TransactionId(p.u64()?),
            },
            WalRecordType::Put => Self::Put {
                txid: TransactionId(p.u64()?),
                table: p.string()?,
                key: p.string()?,
                value: p.bytes()?.to_vec(),
            },
            WalRecordType::Delete => Self::Delete {
                txid: TransactionId(p.u64()?),
                table: p.string()?,
                key: p.string()?,
            },
            WalRecordType::Commit => Self::Commit {
                txid: TransactionId(p.u64()?),
                sequence: SequenceNumber(p.u64()?),
            },
            WalRecordType::Abort => Self::Abort {
                txid: TransactionId(p.u64()?),
            },
            WalRecordType::Checkpoint => Self::Checkpoint {
                sequence: SequenceNumber(p.u64()?),
            },
        };
        p.finish(record_type)?;
        Ok(record)
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| CoreError::invalid_operation("journal field larger than 4 GiB"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct Payload<'a> {
    bytes: &'a [u8],
    pos: usize,
    offset: u64,
}

impl<'a> Payload<'a> {
    fn take(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| CoreError::corruption(self.offset, "payload ends early"))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn bytes(&mut self) -> CoreResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn string(&mut self) -> CoreResult<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| CoreError::corruption(self.offset, "name is not UTF-8"))
    }

    fn finish(&self, record_type: WalRecordType) -> CoreResult<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(CoreError::corruption(
                self.offset,
                format!(
                    "{} trailing bytes in {record_type:?} record",
                    self.bytes.len() - self.pos
                ),
            ))
        }
    }
}

/// CRC-32 (IEEE) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 == 1 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}
