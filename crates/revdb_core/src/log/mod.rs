//! The document log.
//!
//! The log is the durable form of the document table: an append-only
//! sequence of put, remove and checkpoint records. Replaying it from the
//! start rebuilds the table, including scan order.
//!
//! ```text
//! | len u32 | kind u8 | seq u64 | id_len u16 | id | rev_len u16 | rev | body | crc32 u32 |
//! ```
//!
//! All integers are little-endian and `len` covers the whole record.
//!
//! ## Recovery
//!
//! A record cut short by a crash mid-append can only be the last one, so
//! an incomplete tail (or a zero-filled tail left by a pre-extended file)
//! is reported as torn and dropped. A complete record that fails its CRC
//! or carries an unknown kind is corruption and stops recovery.
//!
//! A length prefix that runs past the end of the log only counts as a torn
//! tail when it is within [`MAX_RECORD_SIZE`] and no complete record can
//! be found in the bytes it claims. Otherwise the prefix itself is damaged
//! and the records behind it must not be thrown away.

mod record;
mod verify;

pub use record::{LogRecord, RecordKind, MAX_RECORD_SIZE, MIN_RECORD_SIZE};
pub use verify::{verify_log, VerifyReport};

use crate::error::{CoreError, CoreResult};
use record::LEN_SIZE;

/// Result of scanning a log image.
#[derive(Debug, Default)]
pub struct LogScan {
    /// Decoded records with their offsets.
    pub records: Vec<(u64, LogRecord)>,
    /// Length of the prefix holding whole records.
    pub valid_len: u64,
    /// Whether bytes after `valid_len` had to be discarded.
    pub torn_tail: bool,
}

/// Scans a complete log image.
///
/// # Errors
///
/// Returns `ChecksumMismatch` or `LogCorruption` for a damaged complete
/// record, or for a length prefix that cannot belong to a torn final
/// record.
pub fn scan_log(data: &[u8]) -> CoreResult<LogScan> {
    let mut scan = LogScan::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let rest = &data[pos..];
        if rest.len() < LEN_SIZE || rest.iter().all(|&b| b == 0) {
            scan.torn_tail = true;
            break;
        }

        let mut len_bytes = [0u8; LEN_SIZE];
        len_bytes.copy_from_slice(&rest[..LEN_SIZE]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len < MIN_RECORD_SIZE {
            return Err(CoreError::log_corruption(
                pos as u64,
                format!("record length {len} below minimum"),
            ));
        }
        if len > MAX_RECORD_SIZE {
            return Err(CoreError::log_corruption(
                pos as u64,
                format!("record length {len} above maximum"),
            ));
        }
        if len > rest.len() {
            if let Some(next) = find_record(data, pos + 1) {
                return Err(CoreError::log_corruption(
                    pos as u64,
                    format!("record length {len} overruns the log but a record starts at {next}"),
                ));
            }
            scan.torn_tail = true;
            break;
        }

        let record = LogRecord::decode(&rest[..len], pos as u64)?;
        scan.records.push((pos as u64, record));
        pos += len;
    }

    scan.valid_len = pos as u64;
    Ok(scan)
}

/// Offset of the first complete, checksummed record at or after `from`.
fn find_record(data: &[u8], from: usize) -> Option<usize> {
    let last = data.len().checked_sub(MIN_RECORD_SIZE)?;
    (from..=last).find(|&at| {
        let rest = &data[at..];
        let mut len_bytes = [0u8; LEN_SIZE];
        len_bytes.copy_from_slice(&rest[..LEN_SIZE]);
        let len = u32::from_le_bytes(len_bytes) as usize;
        (MIN_RECORD_SIZE..=rest.len()).contains(&len)
            && RecordKind::from_byte(rest[LEN_SIZE]).is_some()
            && LogRecord::decode(&rest[..len], at as u64).is_ok()
    })
}
