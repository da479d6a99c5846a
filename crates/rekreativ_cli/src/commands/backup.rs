//! Backup commands.
//!
//! Backups live inside the store's `backups` collection; these commands
//! create, list and restore them.

use super::{open_existing, CliError, CliResult};
use std::path::Path;
use tracing::info;

/// Creates a backup of the current contents.
pub fn create(path: &Path) -> CliResult<()> {
    info!("Creating backup of {:?}", path);
    let store = open_existing(path)?;
    let backup = store.create_backup()?;
    store.close()?;

    println!("✓ Backup created successfully");
    println!("  Id: {}", backup.id);
    println!("  Size: {} bytes", backup.metadata.size);
    println!("  Schema version: {}", backup.metadata.version);
    println!("  Timestamp: {}", backup.metadata.timestamp);
    Ok(())
}

/// Lists stored backups, oldest first.
pub fn list(path: &Path) -> CliResult<()> {
    let store = open_existing(path)?;
    let backups = store.list_backups()?;
    store.close()?;

    if backups.is_empty() {
        println!("No backups");
        return Ok(());
    }
    for backup in backups {
        println!(
            "{}  {}  {:>8} bytes  v{}",
            backup.id, backup.metadata.timestamp, backup.metadata.size, backup.metadata.version
        );
    }
    Ok(())
}

/// Restores a stored backup over the current contents.
pub fn restore(path: &Path, id: &str) -> CliResult<()> {
    info!("Restoring backup {} into {:?}", id, path);
    let store = open_existing(path)?;
    let mut report = store.restore_backup(id)?;
    store.close()?;

    if let Some(reason) = report.rejected.take() {
        return Err(CliError::ImportRejected(reason));
    }
    println!("✓ Backup {id} restored");
    println!("  Records: {}", report.total());
    Ok(())
}
