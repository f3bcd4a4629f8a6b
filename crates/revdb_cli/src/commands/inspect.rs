//! Inspect command implementation.

use super::open_existing;
use revdb_core::StoreStats;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Store statistics.
    #[serde(flatten)]
    pub stats: StoreStats,
    /// Whether automatic compaction would run now.
    pub wants_compaction: bool,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let stats = store.stats()?;
    let config = store.config();
    let result = InspectResult {
        path: path.display().to_string(),
        wants_compaction: stats.wants_compaction(config.compact_ratio, config.compact_min_records),
        stats,
    };
    store.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    let stats = &result.stats;
    println!("Store: {}", result.path);
    println!("================");
    println!();
    println!("  Documents:     {}", stats.documents);
    println!("  Log records:   {}", stats.log_records);
    println!("  Dead records:  {}", stats.dead_records);
    println!("  Log size:      {} bytes", stats.log_bytes);
    println!("  Last sequence: {}", stats.last_sequence);
    if result.wants_compaction {
        println!();
        println!("  Compaction recommended (run `revdb compact`)");
    }
}
