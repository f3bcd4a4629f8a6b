//! Compact command implementation.

use super::open_existing;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let stats = store.stats()?;

    println!("Compacting document log at {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    if dry_run {
        println!("Compaction Analysis:");
        println!("  Input records:  {}", stats.log_records);
        println!("  Output records: {}", stats.documents + 1);
        println!("  Dead records:   {}", stats.dead_records);
        println!("  Size before:    {} bytes", stats.log_bytes);
        store.close()?;
        return Ok(());
    }

    tracing::info!(records = stats.log_records, "compacting");
    let result = store.compact()?;
    store.close()?;

    println!("Compaction Result:");
    println!("  Input records:  {}", result.records_before);
    println!("  Output records: {}", result.records_after);
    println!("  Size before:    {} bytes", result.bytes_before);
    println!("  Size after:     {} bytes", result.bytes_after);
    println!(
        "  Space saved:    {} bytes ({:.1}%)",
        result.bytes_saved(),
        if result.bytes_before > 0 {
            (result.bytes_saved() as f64 / result.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );

    Ok(())
}
