//! Single-document commands.

use revdb_core::Store;
use std::path::Path;

/// Prints the document with `id`, or `null`.
pub fn get(path: &Path, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    println!("{}", serde_json::to_string_pretty(&store.get_json(id))?);
    store.close()?;
    Ok(())
}

/// Writes a document and prints the result record. Creates the store if
/// needed.
///
/// A conflict or other rejected write is printed and reported as a
/// failure exit.
pub fn put(path: &Path, doc: &str) -> Result<(), Box<dyn std::error::Error>> {
    let doc: serde_json::Value = serde_json::from_str(doc)?;
    let store = Store::open(path)?;
    let result = store.put_json(doc);
    store.close()?;

    println!("{}", serde_json::to_string(&result)?);
    if result.get("error").is_some() {
        return Err("Write rejected".into());
    }
    tracing::info!(id = %result["id"], rev = %result["rev"], "document written");
    Ok(())
}
