//! Document log record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::types::{Revision, SequenceNumber};

/// Size of the length prefix.
pub const LEN_SIZE: usize = 4;

/// Size of the trailing CRC.
pub const CRC_SIZE: usize = 4;

/// Smallest possible record:
/// len (4) + kind (1) + seq (8) + id_len (2) + rev_len (2) + crc (4).
pub const MIN_RECORD_SIZE: usize = LEN_SIZE + 1 + 8 + 2 + 2 + CRC_SIZE;

/// Largest record the log writes or accepts (16 MiB).
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

const EMPTY: &[u8] = &[];

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Document written.
    Put = 1,
    /// Document removed.
    Remove = 2,
    /// Sequence high-water mark left by compaction.
    Checkpoint = 3,
}

impl RecordKind {
    /// Converts a byte to a record kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Remove),
            3 => Some(Self::Checkpoint),
            _ => None,
        }
    }

    /// Converts the record kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One entry of the document log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A document was written.
    Put {
        /// Commit sequence.
        sequence: SequenceNumber,
        /// Document id.
        id: String,
        /// Revision stored with the write.
        rev: Revision,
        /// CBOR-encoded body.
        body: Vec<u8>,
    },

    /// A document was removed.
    Remove {
        /// Commit sequence.
        sequence: SequenceNumber,
        /// Document id.
        id: String,
        /// Revision the document had when removed.
        rev: Revision,
    },

    /// Highest sequence issued before a compaction.
    Checkpoint {
        /// Sequence high-water mark.
        sequence: SequenceNumber,
    },
}

impl LogRecord {
    /// Returns the record kind.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Put { .. } => RecordKind::Put,
            Self::Remove { .. } => RecordKind::Remove,
            Self::Checkpoint { .. } => RecordKind::Checkpoint,
        }
    }

    /// Returns the record's sequence.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        match self {
            Self::Put { sequence, .. }
            | Self::Remove { sequence, .. }
            | Self::Checkpoint { sequence } => *sequence,
        }
    }

    /// Returns the document id, empty for checkpoints.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Put { id, .. } | Self::Remove { id, .. } => id,
            Self::Checkpoint { .. } => "",
        }
    }

    /// Encodes the record including its length prefix and CRC.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if the id or revision exceeds 65535 bytes,
    /// or the record would exceed [`MAX_RECORD_SIZE`].
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let (id, rev, body) = match self {
            Self::Put { id, rev, body, .. } => (id.as_str(), rev.as_str(), body.as_slice()),
            Self::Remove { id, rev, .. } => (id.as_str(), rev.as_str(), EMPTY),
            Self::Checkpoint { .. } => ("", "", EMPTY),
        };

        let id_len = u16::try_from(id.len())
            .map_err(|_| CoreError::invalid_document("document id is too long"))?;
        let rev_len = u16::try_from(rev.len())
            .map_err(|_| CoreError::invalid_document("revision is too long"))?;

        let total = MIN_RECORD_SIZE + id.len() + rev.len() + body.len();
        if total > MAX_RECORD_SIZE {
            return Err(CoreError::invalid_document("document is too large"));
        }
        let total_u32 = u32::try_from(total)
            .map_err(|_| CoreError::invalid_document("document is too large"))?;

        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&total_u32.to_le_bytes());
        buf.push(self.kind().as_byte());
        buf.extend_from_slice(&self.sequence().as_u64().to_le_bytes());
        buf.extend_from_slice(&id_len.to_le_bytes());
        buf.extend_from_slice(id.as_bytes());
        buf.extend_from_slice(&rev_len.to_le_bytes());
        buf.extend_from_slice(rev.as_bytes());
        buf.extend_from_slice(body);

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes one complete record. `data` must be exactly the bytes the
    /// length prefix covers; `offset` is used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` or `LogCorruption`.
    pub fn decode(data: &[u8], offset: u64) -> CoreResult<Self> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(CoreError::log_corruption(offset, "record too short"));
        }

        let crc_start = data.len() - CRC_SIZE;
        let expected = u32::from_le_bytes(read_array(data, crc_start)?);
        let actual = compute_crc32(&data[..crc_start]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        let mut reader = FieldReader {
            data: &data[..crc_start],
            pos: LEN_SIZE,
            offset,
        };

        let kind_byte = reader.u8()?;
        let kind = RecordKind::from_byte(kind_byte).ok_or_else(|| {
            CoreError::log_corruption(offset, format!("unknown record kind {kind_byte}"))
        })?;
        let sequence = SequenceNumber::new(reader.u64()?);
        let id = reader.string()?;
        let rev = Revision::from(reader.string()?);
        let body = reader.rest().to_vec();

        match kind {
            RecordKind::Put => Ok(Self::Put {
                sequence,
                id,
                rev,
                body,
            }),
            RecordKind::Remove if body.is_empty() => Ok(Self::Remove { sequence, id, rev }),
            RecordKind::Checkpoint if body.is_empty() && id.is_empty() => {
                Ok(Self::Checkpoint { sequence })
            }
            _ => Err(CoreError::log_corruption(
                offset,
                format!("unexpected payload in {kind:?} record"),
            )),
        }
    }
}

struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
    offset: u64,
}

impl<'a> FieldReader<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CoreError::log_corruption(self.offset, "field overruns record"));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(read_array(bytes, 0)?))
    }

    fn string(&mut self) -> CoreResult<String> {
        let len_bytes = self.take(2)?;
        let len = u16::from_le_bytes(read_array(len_bytes, 0)?);
        let bytes = self.take(usize::from(len))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CoreError::log_corruption(self.offset, "invalid UTF-8 in record"))
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }
}

fn read_array<const N: usize>(data: &[u8], at: usize) -> CoreResult<[u8; N]> {
    data.get(at..at + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| CoreError::log_corruption(at as u64, "short read"))
}

/// CRC-32 (IEEE) lookup table.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Computes the CRC-32 (IEEE) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
