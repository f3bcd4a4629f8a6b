//! Offline log verification.

use super::{scan_log, LogRecord};
use crate::error::CoreResult;
use serde::Serialize;
use std::path::Path;

/// Outcome of [`verify_log`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// File size in bytes.
    pub bytes: u64,
    /// Whole records read before any problem.
    pub records: u64,
    /// Put records among them.
    pub puts: u64,
    /// Remove records among them.
    pub removes: u64,
    /// Checkpoint records among them.
    pub checkpoints: u64,
    /// Highest sequence seen.
    pub last_sequence: u64,
    /// Whether an incomplete final record was found.
    pub torn_tail: bool,
    /// Offset of the first damaged record.
    pub corrupt_at: Option<u64>,
    /// Description of the damage.
    pub error: Option<String>,
}

impl VerifyReport {
    /// True when the log can be opened without losing complete records.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.corrupt_at.is_none()
    }

    fn count(&mut self, records: &[(u64, LogRecord)]) {
        for (_, record) in records {
            self.records += 1;
            self.last_sequence = self.last_sequence.max(record.sequence().as_u64());
            match record {
                LogRecord::Put { .. } => self.puts += 1,
                LogRecord::Remove { .. } => self.removes += 1,
                LogRecord::Checkpoint { .. } => self.checkpoints += 1,
            }
        }
    }
}

/// Checks a document log without opening the store or taking its lock.
///
/// Damage is reported in the returned value, not as an error. When a
/// damaged record is found, the counts cover the records before it.
///
/// # Errors
///
/// Fails only if the file cannot be read.
pub fn verify_log(path: &Path) -> CoreResult<VerifyReport> {
    let data = std::fs::read(path)?;
    let mut report = VerifyReport {
        bytes: data.len() as u64,
        ..VerifyReport::default()
    };

    match scan_log(&data) {
        Ok(scan) => {
            report.count(&scan.records);
            report.torn_tail = scan.torn_tail;
        }
        Err(err) => {
            let corrupt_at = err.log_offset().unwrap_or(0);
            // Count the intact prefix.
            let prefix = usize::try_from(corrupt_at).unwrap_or(data.len()).min(data.len());
            if let Ok(scan) = scan_log(&data[..prefix]) {
                report.count(&scan.records);
            }
            report.corrupt_at = Some(corrupt_at);
            report.error = Some(err.to_string());
        }
    }

    Ok(report)
}
