//! Verify command implementation.

use super::LOG_FILE;
use revdb_core::{verify_log, VerifyReport};
use std::path::Path;

/// Runs the verify command.
///
/// Reads the log directly, so it works on a store another process has
/// open and never repairs anything.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = path.join(LOG_FILE);
    if !log_path.exists() {
        return Err(format!("No document log at {}", log_path.display()).into());
    }

    tracing::info!(path = %log_path.display(), "verifying document log");
    let report = verify_log(&log_path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}

fn print_text_output(report: &VerifyReport) {
    println!("Document log: {} bytes", report.bytes);
    println!("  Records:       {}", report.records);
    println!("    puts:        {}", report.puts);
    println!("    removes:     {}", report.removes);
    println!("    checkpoints: {}", report.checkpoints);
    println!("  Last sequence: {}", report.last_sequence);
    if report.torn_tail {
        println!("  Torn final record (will be discarded on next open)");
    }
    println!();

    match (&report.corrupt_at, &report.error) {
        (Some(offset), error) => {
            println!("✗ Corrupt record at offset {offset}");
            if let Some(error) = error {
                println!("  {error}");
            }
        }
        (None, _) => println!("✓ Document log verification passed"),
    }
}
