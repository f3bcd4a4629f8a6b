//! Dump command implementation.

use super::LOG_FILE;
use revdb_core::{scan_log, LogRecord, RecordKind};
use revdb_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// Log record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset in the log file.
    pub offset: u64,
    /// Record kind.
    pub kind: String,
    /// Sequence number.
    pub sequence: u64,
    /// Document id (puts and removes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Revision (puts and removes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Encoded body size in bytes (puts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_size: Option<usize>,
    /// Decoded body (puts, when requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    start_offset: u64,
    bodies: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = path.join(LOG_FILE);
    if !log_path.exists() {
        return Err("Document log not found".into());
    }

    let backend = FileBackend::open(&log_path)?;
    let records = read_records(&backend, start_offset, limit, bodies)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Decodes the records at or after `start_offset`.
pub fn read_records(
    backend: &dyn StorageBackend,
    start_offset: u64,
    limit: Option<usize>,
    bodies: bool,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let data = backend.read_all()?;
    let scan = scan_log(&data)?;
    if scan.torn_tail {
        tracing::warn!(valid_len = scan.valid_len, "document log ends in a torn record");
    }

    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    for (offset, record) in scan.records {
        if offset < start_offset {
            continue;
        }
        if records.len() >= max_records {
            break;
        }
        records.push(describe(offset, record, bodies)?);
    }
    Ok(records)
}

fn describe(
    offset: u64,
    record: LogRecord,
    bodies: bool,
) -> Result<RecordInfo, Box<dyn std::error::Error>> {
    let kind = match record.kind() {
        RecordKind::Put => "PUT",
        RecordKind::Remove => "REMOVE",
        RecordKind::Checkpoint => "CHECKPOINT",
    };
    let mut info = RecordInfo {
        offset,
        kind: kind.to_string(),
        sequence: record.sequence().as_u64(),
        id: None,
        rev: None,
        body_size: None,
        body: None,
    };

    match record {
        LogRecord::Put { id, rev, body, .. } => {
            info.body_size = Some(body.len());
            if bodies {
                let value = revdb_codec::from_cbor(&body)?;
                info.body = Some(serde_json::Value::from(&value));
            }
            info.id = Some(id);
            info.rev = Some(rev.into_string());
        }
        LogRecord::Remove { id, rev, .. } => {
            info.id = Some(id);
            info.rev = Some(rev.into_string());
        }
        LogRecord::Checkpoint { .. } => {}
    }
    Ok(info)
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Log Records ({} total)", records.len());
    println!("================");
    println!();

    for record in records {
        print!("[{:08}] {:10} seq={}", record.offset, record.kind, record.sequence);

        if let Some(ref id) = record.id {
            print!(" id={id}");
        }
        if let Some(ref rev) = record.rev {
            print!(" rev={rev}");
        }
        if let Some(size) = record.body_size {
            print!(" body={size} bytes");
        }
        if let Some(ref body) = record.body {
            print!(" {body}");
        }

        println!();
    }
}
