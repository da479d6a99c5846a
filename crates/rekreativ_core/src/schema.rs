//! Collection definitions and the application schema.

use crate::error::CoreResult;
use crate::migration::{Migration, MigrationManager, MigrationVersion, UpgradeContext};
use serde::{Deserialize, Serialize};

/// Schema version the application expects.
pub const CURRENT_VERSION: MigrationVersion = 2;

/// Machines, keyed by `id`.
pub const MACHINES: &str = "machines";
/// Clients, keyed by integer `id`.
pub const CLIENTS: &str = "clients";
/// Revenue collection events.
pub const COLLECTIONS: &str = "collections";
/// Expenses.
pub const EXPENSES: &str = "expenses";
/// Singleton company profile, keyed `"default"`.
pub const COMPANY_PROFILE: &str = "companyProfile";
/// Users and their credentials.
pub const USERS: &str = "users";
/// Stored snapshots.
pub const BACKUPS: &str = "backups";
/// Counter history, keyed by timestamp. Introduced in version 2.
pub const COUNTER_HISTORY: &str = "counterHistory";

/// Index on `serialNumber` (unique).
pub const BY_SERIAL_NUMBER: &str = "by-serial-number";
/// Index on `clientId`.
pub const BY_CLIENT_ID: &str = "by-client-id";
/// Index on `status`.
pub const BY_STATUS: &str = "by-status";
/// Index on `name`.
pub const BY_NAME: &str = "by-name";
/// Index on `machineId`.
pub const BY_MACHINE_ID: &str = "by-machine-id";
/// Index on `date`.
pub const BY_DATE: &str = "by-date";
/// Index on `username` (unique).
pub const BY_USERNAME: &str = "by-username";

/// A secondary index: a name, the key path it reads, and whether values
/// must be unique across the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Dotted path of the indexed field.
    pub key_path: String,
    /// Whether two records may share a value.
    pub unique: bool,
}

impl IndexDef {
    /// A non-unique index.
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
        }
    }

    /// A unique index.
    pub fn unique(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            unique: true,
            ..Self::new(name, key_path)
        }
    }
}

/// A named collection with its primary key path and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDef {
    /// Collection name.
    pub name: String,
    /// Dotted path of the primary key.
    pub key_path: String,
    /// Secondary indexes.
    pub indexes: Vec<IndexDef>,
}

impl CollectionDef {
    /// A collection without indexes.
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            indexes: Vec::new(),
        }
    }

    /// Adds an index.
    #[must_use]
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }
}

/// Collections included in snapshot documents, in document order.
pub const SNAPSHOT_COLLECTIONS: [&str; 7] = [
    MACHINES,
    CLIENTS,
    COLLECTIONS,
    EXPENSES,
    COMPANY_PROFILE,
    USERS,
    COUNTER_HISTORY,
];

/// Version 1: the business collections.
struct InitialSchema;

impl Migration for InitialSchema {
    fn version(&self) -> MigrationVersion {
        1
    }

    fn name(&self) -> &str {
        "initial_schema"
    }

    fn description(&self) -> Option<&str> {
        Some("machines, clients, collections, expenses, company profile, users and backups")
    }

    fn up(&self, ctx: &mut UpgradeContext) -> CoreResult<()> {
        ctx.create_collection(
            CollectionDef::new(MACHINES, "id")
                .with_index(IndexDef::unique(BY_SERIAL_NUMBER, "serialNumber"))
                .with_index(IndexDef::new(BY_CLIENT_ID, "clientId"))
                .with_index(IndexDef::new(BY_STATUS, "status")),
        );
        ctx.create_collection(
            CollectionDef::new(CLIENTS, "id").with_index(IndexDef::new(BY_NAME, "name")),
        );
        for name in [COLLECTIONS, EXPENSES] {
            ctx.create_collection(
                CollectionDef::new(name, "id")
                    .with_index(IndexDef::new(BY_MACHINE_ID, "machineId"))
                    .with_index(IndexDef::new(BY_CLIENT_ID, "clientId"))
                    .with_index(IndexDef::new(BY_DATE, "date")),
            );
        }
        ctx.create_collection(CollectionDef::new(COMPANY_PROFILE, "id"));
        ctx.create_collection(
            CollectionDef::new(USERS, "id").with_index(IndexDef::unique(BY_USERNAME, "username")),
        );
        ctx.create_collection(CollectionDef::new(BACKUPS, "id"));
        Ok(())
    }
}

/// Version 2: the counter history log.
struct CounterHistorySchema;

impl Migration for CounterHistorySchema {
    fn version(&self) -> MigrationVersion {
        2
    }

    fn name(&self) -> &str {
        "counter_history"
    }

    fn up(&self, ctx: &mut UpgradeContext) -> CoreResult<()> {
        ctx.create_collection(
            CollectionDef::new(COUNTER_HISTORY, "timestamp")
                .with_index(IndexDef::new(BY_MACHINE_ID, "machineId")),
        );
        Ok(())
    }
}

/// Migrations for the application schema, versions 1 through
/// [`CURRENT_VERSION`].
pub fn app_migrations() -> CoreResult<MigrationManager> {
    let mut manager = MigrationManager::new();
    manager.register(Box::new(InitialSchema))?;
    manager.register(Box::new(CounterHistorySchema))?;
    Ok(manager)
}
