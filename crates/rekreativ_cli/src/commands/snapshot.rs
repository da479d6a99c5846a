//! Export and import commands.

use super::{file_error, open_existing, CliError, CliResult};
use std::fs;
use std::path::Path;
use tracing::info;

/// Writes the store's snapshot document to `output`.
pub fn export(path: &Path, output: &Path) -> CliResult<()> {
    let store = open_existing(path)?;
    let document = store.export_json()?;
    fs::write(output, document.as_bytes()).map_err(|e| file_error(output, e))?;
    store.close()?;

    println!("✓ Exported to {}", output.display());
    println!("  Size: {} bytes", document.len());
    Ok(())
}

/// Replaces the collections named in `input` with its contents.
pub fn import(path: &Path, input: &Path) -> CliResult<()> {
    info!("Importing {:?} into {:?}", input, path);
    let text = fs::read_to_string(input).map_err(|e| file_error(input, e))?;
    let store = open_existing(path)?;
    let mut report = store.import_json(&text)?;
    store.close()?;

    if let Some(reason) = report.rejected.take() {
        return Err(CliError::ImportRejected(reason));
    }
    println!("✓ Imported {} records", report.total());
    for (collection, count) in &report.imported {
        println!("  {collection:<16} {count}");
    }
    if !report.skipped.is_empty() {
        println!("  Skipped keys: {}", report.skipped.join(", "));
    }
    let credentials = report.credentials;
    if credentials.placeholder > 0 {
        println!(
            "  {} user(s) got the placeholder password; ask them to change it",
            credentials.placeholder
        );
    }
    Ok(())
}
