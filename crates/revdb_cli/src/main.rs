//! revdb CLI
//!
//! Command-line tools for revdb store maintenance.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics
//! - `verify` - Check the document log without opening the store
//! - `dump` - List document log records for debugging
//! - `compact` - Rewrite the log down to the live documents
//! - `get` / `put` - Read or write a single document as JSON

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// revdb command-line store tools.
#[derive(Parser)]
#[command(name = "revdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify document log integrity
    Verify {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump document log records for debugging
    Dump {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip records before this offset
        #[arg(short, long, default_value = "0")]
        offset: u64,

        /// Include decoded document bodies
        #[arg(short, long)]
        bodies: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Compact the document log
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Print one document as JSON
    Get {
        /// Document id
        id: String,
    },

    /// Write one document given as JSON (with `_id` and, to update, `_rev`)
    Put {
        /// Document JSON
        doc: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify { format } => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path, &format)?;
        }
        Commands::Dump {
            limit,
            offset,
            bodies,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&path, limit, offset, bodies, &format)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Get { id } => {
            let path = cli.path.ok_or("Store path required for get")?;
            commands::doc::get(&path, &id)?;
        }
        Commands::Put { doc } => {
            let path = cli.path.ok_or("Store path required for put")?;
            commands::doc::put(&path, &doc)?;
        }
        Commands::Version => {
            println!("revdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("revdb core v{}", revdb_core::VERSION);
        }
    }

    Ok(())
}
