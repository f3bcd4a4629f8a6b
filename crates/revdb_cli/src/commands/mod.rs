//! CLI command implementations.

pub mod compact;
pub mod doc;
pub mod dump;
pub mod inspect;
pub mod verify;

use revdb_core::{Config, Store};
use std::path::Path;

/// Name of the document log inside a store directory.
pub const LOG_FILE: &str = "docs.log";

/// Opens an existing store; never creates one.
pub fn open_existing(path: &Path) -> Result<Store, Box<dyn std::error::Error>> {
    if !path.join(LOG_FILE).exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Store::open_with_config(
        path,
        Config::new().create_if_missing(false),
    )?)
}
