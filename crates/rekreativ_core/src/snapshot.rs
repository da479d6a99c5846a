//! Whole-store export and import.
//!
//! A snapshot is one JSON object mapping collection names to arrays of
//! records:
//!
//! ```text
//! {
//!   "clients": [ { "id": 1, ... } ],
//!   "machines": [ { "id": "M001", ... } ],
//!   "users": [ { "id": "admin-default", "username": "admin", ... } ],
//!   ...
//! }
//! ```
//!
//! Backups are never exported and user passwords are stripped. Import
//! therefore rebuilds passwords, preferring the one in the document, then
//! the one the same username had before the import, then the configured
//! placeholder.

use crate::error::{CoreError, CoreResult};
use crate::schema::{SNAPSHOT_COLLECTIONS, USERS};
use crate::store::Store;
use crate::transaction::Transaction;
use crate::types::TransactionMode;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

const PASSWORD_FIELD: &str = "password";
const USERNAME_FIELD: &str = "username";

/// Where imported user passwords came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialStats {
    /// Taken from the document.
    pub from_document: usize,
    /// Kept from the user with the same username before the import.
    pub preserved: usize,
    /// Set to the placeholder.
    pub placeholder: usize,
}

/// Outcome of [`Store::import_json`].
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Records written per collection.
    pub imported: BTreeMap<String, usize>,
    /// Document keys that named no collection of this store, or whose value
    /// was not an array.
    pub skipped: Vec<String>,
    /// Password provenance for imported users.
    pub credentials: CredentialStats,
    /// Set when the document was rejected and nothing was written.
    pub rejected: Option<CoreError>,
}

impl ImportReport {
    fn rejection(reason: impl Into<String>, skipped: Vec<String>) -> Self {
        Self {
            skipped,
            rejected: Some(CoreError::import_malformed(reason)),
            ..Self::default()
        }
    }

    /// True when the document was accepted.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.rejected.is_none()
    }

    /// Total records written.
    #[must_use]
    pub fn total(&self) -> usize {
        self.imported.values().sum()
    }
}

impl Store {
    /// Exports every snapshot collection to a pretty-printed JSON document.
    ///
    /// All collections are read in one read-only transaction, so the
    /// document is a consistent cut.
    pub fn export_json(&self) -> CoreResult<String> {
        let document = self.export_document()?;
        let text = serde_json::to_string_pretty(&document)?;
        info!(bytes = text.len(), "store exported");
        Ok(text)
    }

    /// Exports every snapshot collection as a JSON object.
    pub fn export_document(&self) -> CoreResult<Value> {
        let names: Vec<&str> = SNAPSHOT_COLLECTIONS
            .iter()
            .copied()
            .filter(|name| self.has_collection(name))
            .collect();

        self.with_transaction(&names, TransactionMode::ReadOnly, |tx| {
            let mut document = Map::new();
            for name in &names {
                let mut records = tx.get_all(name)?;
                if *name == USERS {
                    for user in &mut records {
                        if let Value::Object(fields) = user {
                            fields.remove(PASSWORD_FIELD);
                        }
                    }
                }
                document.insert((*name).to_string(), Value::Array(records));
            }
            Ok(Value::Object(document))
        })
    }

    /// Imports a JSON snapshot.
    ///
    /// Every collection named in the document is cleared and refilled in
    /// one read-write transaction; collections the document does not name
    /// are untouched. A document that is not an object, or names no known
    /// collection, writes nothing and comes back with `rejected` set.
    ///
    /// # Errors
    ///
    /// `Json` if `text` is not JSON. Any write failure (duplicate key,
    /// unique index violation, record without a key) aborts the whole
    /// import and is returned.
    pub fn import_json(&self, text: &str) -> CoreResult<ImportReport> {
        let document: Value = serde_json::from_str(text)?;
        self.import_document(document)
    }

    /// Imports an already-parsed snapshot. See [`Store::import_json`].
    pub fn import_document(&self, document: Value) -> CoreResult<ImportReport> {
        let Value::Object(entries) = document else {
            warn!("import document is not an object; nothing imported");
            return Ok(ImportReport::rejection("document root is not an object", Vec::new()));
        };

        let mut selected: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        let mut skipped = Vec::new();
        for (name, value) in entries {
            match value {
                Value::Array(records) if self.has_collection(&name) => {
                    selected.insert(name, records);
                }
                _ => skipped.push(name),
            }
        }
        if selected.is_empty() {
            warn!(?skipped, "import document names no known collection; nothing imported");
            return Ok(ImportReport::rejection("no known collection in document", skipped));
        }

        let names: Vec<&str> = selected.keys().map(String::as_str).collect();
        let placeholder = self.config().placeholder_credential.as_str();
        let (imported, credentials) =
            self.with_transaction(&names, TransactionMode::ReadWrite, |tx| {
                let previous = if selected.contains_key(USERS) {
                    existing_passwords(tx)?
                } else {
                    HashMap::new()
                };

                let mut imported = BTreeMap::new();
                let mut credentials = CredentialStats::default();
                for (name, records) in &selected {
                    tx.clear(name)?;
                    for record in records {
                        let mut record = record.clone();
                        if name == USERS {
                            restore_password(&mut record, &previous, placeholder, &mut credentials);
                        }
                        tx.add(name, record)?;
                    }
                    imported.insert(name.clone(), records.len());
                }
                Ok((imported, credentials))
            })?;

        let report = ImportReport {
            imported,
            skipped,
            credentials,
            rejected: None,
        };
        info!(
            collections = report.imported.len(),
            records = report.total(),
            preserved_passwords = report.credentials.preserved,
            placeholder_passwords = report.credentials.placeholder,
            "store imported"
        );
        Ok(report)
    }
}

/// `username -> password` as stored before anything is cleared.
fn existing_passwords(tx: &Transaction<'_>) -> CoreResult<HashMap<String, String>> {
    Ok(tx
        .get_all(USERS)?
        .iter()
        .filter_map(|user| {
            let username = user.get(USERNAME_FIELD)?.as_str()?;
            let password = non_empty_password(user)?;
            Some((username.to_string(), password.to_string()))
        })
        .collect())
}

fn non_empty_password(user: &Value) -> Option<&str> {
    user.get(PASSWORD_FIELD)
        .and_then(Value::as_str)
        .filter(|password| !password.is_empty())
}

fn restore_password(
    user: &mut Value,
    previous: &HashMap<String, String>,
    placeholder: &str,
    stats: &mut CredentialStats,
) {
    if non_empty_password(user).is_some() {
        stats.from_document += 1;
        return;
    }
    let kept = user
        .get(USERNAME_FIELD)
        .and_then(Value::as_str)
        .and_then(|username| previous.get(username))
        .cloned();
    let password = match kept {
        Some(password) => {
            stats.preserved += 1;
            password
        }
        None => {
            stats.placeholder += 1;
            placeholder.to_string()
        }
    };
    if let Value::Object(fields) = user {
        fields.insert(PASSWORD_FIELD.to_string(), Value::String(password));
    }
}
