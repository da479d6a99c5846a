//! Snapshots kept inside the store.
//!
//! A backup is the export document of [`Store::export_json`], base64
//! encoded and stored as one record of the `backups` collection.
//! Restoring goes through the regular import, so user passwords are
//! preserved the same way.
//!
//! ```ignore
//! let backup = store.create_backup()?;
//! // ... later
//! store.restore_backup(&backup.id)?;
//! ```

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::model::{timestamp_now, Backup, BackupMetadata};
use crate::schema::BACKUPS;
use crate::snapshot::ImportReport;
use crate::store::Store;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::info;
use uuid::Uuid;

impl Backup {
    /// Decodes the stored snapshot document.
    pub fn document(&self) -> CoreResult<String> {
        let bytes = STANDARD
            .decode(&self.data)
            .map_err(|e| CoreError::decode(format!("backup {}: {e}", self.id)))?;
        String::from_utf8(bytes).map_err(|e| CoreError::decode(format!("backup {}: {e}", self.id)))
    }
}

impl Store {
    /// Exports the store and keeps the document as a new backup.
    pub fn create_backup(&self) -> CoreResult<Backup> {
        let document = self.export_json()?;
        let created_at = timestamp_now();
        let backup = Backup {
            id: Uuid::new_v4().to_string(),
            data: STANDARD.encode(document.as_bytes()),
            metadata: BackupMetadata {
                timestamp: created_at.clone(),
                size: document.len() as u64,
                version: self.version().to_string(),
            },
            created_at,
        };
        self.add_entity(&backup)?;
        info!(id = %backup.id, size = backup.metadata.size, "backup created");
        Ok(backup)
    }

    /// Every stored backup, oldest first.
    pub fn list_backups(&self) -> CoreResult<Vec<Backup>> {
        let mut backups: Vec<Backup> = self.all_entities()?;
        backups.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(backups)
    }

    /// Reads one backup.
    pub fn get_backup(&self, id: &str) -> CoreResult<Backup> {
        self.get_entity(&Key::from(id))?
            .ok_or_else(|| CoreError::backup_not_found(id))
    }

    /// Imports a stored backup over the current contents.
    ///
    /// # Errors
    ///
    /// `BackupNotFound` for an unknown id, otherwise whatever the import
    /// returns.
    pub fn restore_backup(&self, id: &str) -> CoreResult<ImportReport> {
        let backup = self.get_backup(id)?;
        let report = self.import_json(&backup.document()?)?;
        info!(id, records = report.total(), "backup restored");
        Ok(report)
    }

    /// Deletes a stored backup.
    pub fn delete_backup(&self, id: &str) -> CoreResult<()> {
        self.get_backup(id)?;
        self.delete(BACKUPS, &Key::from(id))?;
        info!(id, "backup deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MACHINES, USERS};
    use serde_json::json;

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .add(
                MACHINES,
                json!({
                    "id": "M001",
                    "serialNumber": "PIN001",
                    "type": "pinball",
                    "model": "X",
                    "brand": "Y",
                    "status": "warehouse"
                }),
            )
            .unwrap();
        store
            .add(
                USERS,
                json!({"id": "u1", "username": "admin", "password": "pw", "name": "A", "role": "admin"}),
            )
            .unwrap();
        store
    }

    #[test]
    fn create_stores_encoded_export() {
        let store = seeded();
        let backup = store.create_backup().unwrap();

        assert_eq!(backup.metadata.version, "2");
        let document = backup.document().unwrap();
        assert_eq!(backup.metadata.size, document.len() as u64);
        assert!(document.contains("PIN001"));
        assert!(!document.contains("\"pw\""));
        assert_eq!(store.count(BACKUPS).unwrap(), 1);
    }

    #[test]
    fn restore_brings_back_deleted_records() {
        let store = seeded();
        let backup = store.create_backup().unwrap();
        store.delete(MACHINES, &Key::from("M001")).unwrap();

        let report = store.restore_backup(&backup.id).unwrap();
        assert!(report.is_applied());
        assert!(store.get(MACHINES, &Key::from("M001")).unwrap().is_some());
        let user = store.get(USERS, &Key::from("u1")).unwrap().unwrap();
        assert_eq!(user["password"], "pw");
        assert_eq!(store.list_backups().unwrap().len(), 1);
    }

    #[test]
    fn unknown_backup_is_reported() {
        let store = seeded();
        assert!(matches!(
            store.restore_backup("nope"),
            Err(CoreError::BackupNotFound { .. })
        ));
        assert!(matches!(
            store.delete_backup("nope"),
            Err(CoreError::BackupNotFound { .. })
        ));
    }

    #[test]
    fn list_and_delete() {
        let store = seeded();
        let first = store.create_backup().unwrap();
        let second = store.create_backup().unwrap();
        let ids: Vec<_> = store.list_backups().unwrap().into_iter().map(|b| b.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));

        store.delete_backup(&first.id).unwrap();
        let remaining = store.list_backups().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);
    }

    #[test]
    fn corrupt_payload_is_a_decode_error() {
        let store = seeded();
        let mut backup = store.create_backup().unwrap();
        backup.data = "***".to_string();
        assert!(matches!(backup.document(), Err(CoreError::Decode { .. })));
    }
}
