//! Schema versioning and upgrades.
//!
//! Migrations are forward-only. Each one declares the collections and
//! indexes its version introduces; the store stages every migration between
//! the on-disk version and the target into one [`UpgradeContext`], checks the
//! result against existing data, and commits it as a single log record.
//!
//! ```ignore
//! use rekreativ_core::migration::{Migration, MigrationManager, UpgradeContext};
//!
//! struct TagsByName;
//! impl Migration for TagsByName {
//!     fn version(&self) -> u32 { 3 }
//!     fn name(&self) -> &str { "tags_by_name" }
//!     fn up(&self, ctx: &mut UpgradeContext) -> CoreResult<()> {
//!         ctx.create_collection(CollectionDef::new("tags", "id"));
//!         ctx.create_index("tags", IndexDef::unique("by-name", "name"))?;
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::{CoreError, CoreResult};
use crate::schema::{CollectionDef, IndexDef};
use crate::wal::IndexAddition;
use std::collections::{BTreeMap, BTreeSet};

/// Version number for migrations.
pub type MigrationVersion = u32;

/// Information about a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    /// Version number (unique, sequential).
    pub version: MigrationVersion,
    /// Human-readable name.
    pub name: String,
    /// Description of what this migration does.
    pub description: Option<String>,
}

/// Result of upgrading a store.
#[derive(Debug, Clone, Default)]
pub struct MigrationRunResult {
    /// Version before the upgrade.
    pub from_version: MigrationVersion,
    /// Version after the upgrade.
    pub final_version: MigrationVersion,
    /// Migrations that ran, in order.
    pub applied: Vec<MigrationInfo>,
    /// Everything the migrations did or skipped.
    pub operations: Vec<MigrationOperation>,
}

impl MigrationRunResult {
    /// True when the store was already at the target version.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// An operation performed during an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOperation {
    /// Created a new collection.
    CreateCollection {
        /// Name of the collection.
        name: String,
    },
    /// Collection already existed and was left alone.
    SkipCollection {
        /// Name of the collection.
        name: String,
    },
    /// Created an index.
    CreateIndex {
        /// Collection the index is on.
        collection: String,
        /// Name of the index.
        index_name: String,
    },
    /// Custom operation.
    Custom {
        /// Description of the operation.
        description: String,
    },
}

/// Staging area handed to [`Migration::up`].
///
/// Nothing touches the store until every migration in the run has staged
/// its changes successfully.
#[derive(Debug)]
pub struct UpgradeContext {
    from_version: MigrationVersion,
    version: MigrationVersion,
    existing: BTreeMap<String, BTreeSet<String>>,
    created: Vec<CollectionDef>,
    added_indexes: Vec<IndexAddition>,
    operations: Vec<MigrationOperation>,
}

impl UpgradeContext {
    /// Creates a context for a store at `from_version` holding `existing`
    /// collections, each with its index names.
    #[must_use]
    pub fn new(
        from_version: MigrationVersion,
        existing: BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        Self {
            from_version,
            version: from_version,
            existing,
            created: Vec::new(),
            added_indexes: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Version the store had before this upgrade.
    #[must_use]
    pub fn from_version(&self) -> MigrationVersion {
        self.from_version
    }

    /// Version of the migration currently running.
    #[must_use]
    pub fn version(&self) -> MigrationVersion {
        self.version
    }

    /// True if the collection exists or was created earlier in this run.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.existing.contains_key(name) || self.created.iter().any(|def| def.name == name)
    }

    /// Creates a collection unless one with that name already exists.
    ///
    /// Returns whether it was created. Existing collections are never
    /// dropped or recreated.
    pub fn create_collection(&mut self, def: CollectionDef) -> bool {
        if self.contains(&def.name) {
            self.operations
                .push(MigrationOperation::SkipCollection { name: def.name });
            return false;
        }
        self.operations.push(MigrationOperation::CreateCollection {
            name: def.name.clone(),
        });
        for index in &def.indexes {
            self.operations.push(MigrationOperation::CreateIndex {
                collection: def.name.clone(),
                index_name: index.name.clone(),
            });
        }
        self.created.push(def);
        true
    }

    /// Adds an index to a collection unless it already has one by that name.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` if the collection neither exists nor was
    /// created earlier in this run.
    pub fn create_index(&mut self, collection: &str, index: IndexDef) -> CoreResult<bool> {
        let index_name = index.name.clone();
        if let Some(def) = self.created.iter_mut().find(|def| def.name == collection) {
            if def.indexes.iter().any(|existing| existing.name == index.name) {
                return Ok(false);
            }
            def.indexes.push(index);
        } else if let Some(names) = self.existing.get_mut(collection) {
            if !names.insert(index.name.clone()) {
                return Ok(false);
            }
            self.added_indexes.push(IndexAddition {
                collection: collection.to_string(),
                index,
            });
        } else {
            return Err(CoreError::collection_not_found(collection));
        }
        self.operations.push(MigrationOperation::CreateIndex {
            collection: collection.to_string(),
            index_name,
        });
        Ok(true)
    }

    /// Records a custom operation.
    pub fn custom(&mut self, description: impl Into<String>) {
        self.operations.push(MigrationOperation::Custom {
            description: description.into(),
        });
    }

    /// Collections staged for creation.
    #[must_use]
    pub fn created(&self) -> &[CollectionDef] {
        &self.created
    }

    /// Indexes staged for existing collections.
    #[must_use]
    pub fn added_indexes(&self) -> &[IndexAddition] {
        &self.added_indexes
    }

    /// Operations recorded so far.
    #[must_use]
    pub fn operations(&self) -> &[MigrationOperation] {
        &self.operations
    }

    pub(crate) fn into_parts(
        self,
    ) -> (Vec<CollectionDef>, Vec<IndexAddition>, Vec<MigrationOperation>) {
        (self.created, self.added_indexes, self.operations)
    }
}

/// Trait for defining migrations.
pub trait Migration: Send + Sync {
    /// Returns the version number for this migration.
    ///
    /// Versions must be unique and sequential starting from 1.
    fn version(&self) -> MigrationVersion;

    /// Returns the name of this migration.
    fn name(&self) -> &str;

    /// Returns an optional description.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Stages the changes this version introduces.
    fn up(&self, ctx: &mut UpgradeContext) -> CoreResult<()>;
}

/// Registry of migrations keyed by version.
pub struct MigrationManager {
    migrations: BTreeMap<MigrationVersion, Box<dyn Migration>>,
}

impl MigrationManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// Registers a migration.
    ///
    /// Returns an error if a migration with the same version already exists.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> CoreResult<()> {
        let version = migration.version();
        if self.migrations.contains_key(&version) {
            return Err(CoreError::migration_failed(format!(
                "migration version {version} already registered"
            )));
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Returns registered migrations in version order.
    #[must_use]
    pub fn list(&self) -> Vec<MigrationInfo> {
        self.migrations.values().map(|m| info(m.as_ref())).collect()
    }

    /// Highest registered version, 0 when empty.
    #[must_use]
    pub fn latest_version(&self) -> MigrationVersion {
        self.migrations.keys().next_back().copied().unwrap_or(0)
    }

    /// Migrations above `current`, in the order they would run.
    #[must_use]
    pub fn pending(&self, current: MigrationVersion) -> Vec<MigrationInfo> {
        self.migrations
            .range(current.saturating_add(1)..)
            .map(|(_, m)| info(m.as_ref()))
            .collect()
    }

    /// Validates that migrations are sequential with no gaps.
    pub fn validate(&self) -> CoreResult<()> {
        for (expected, version) in (1..).zip(self.migrations.keys()) {
            if *version != expected {
                return Err(CoreError::migration_failed(format!(
                    "migration version gap: expected {expected}, got {version}"
                )));
            }
        }
        Ok(())
    }

    /// Runs `up` for every version in `(ctx.from_version(), target]`.
    ///
    /// # Errors
    ///
    /// `MigrationFailed` when the target is below the starting version, a
    /// version in range is not registered, or a migration fails.
    pub fn stage(
        &self,
        ctx: &mut UpgradeContext,
        target: MigrationVersion,
    ) -> CoreResult<Vec<MigrationInfo>> {
        self.validate()?;
        let from = ctx.from_version();
        if target < from {
            return Err(CoreError::migration_failed(format!(
                "cannot downgrade from version {from} to {target}"
            )));
        }
        if target > self.latest_version() {
            return Err(CoreError::migration_failed(format!(
                "no migration registered for version {target}"
            )));
        }

        let mut applied = Vec::new();
        for (version, migration) in self.migrations.range(from + 1..=target) {
            ctx.version = *version;
            migration.up(ctx).map_err(|e| match e {
                CoreError::MigrationFailed { .. } => e,
                other => CoreError::migration_failed(format!(
                    "version {version} ({}): {other}",
                    migration.name()
                )),
            })?;
            applied.push(info(migration.as_ref()));
        }
        Ok(applied)
    }
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

fn info(migration: &dyn Migration) -> MigrationInfo {
    MigrationInfo {
        version: migration.version(),
        name: migration.name().to_string(),
        description: migration.description().map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Step {
        version: MigrationVersion,
        collection: &'static str,
        should_fail: bool,
    }

    impl Migration for Step {
        fn version(&self) -> MigrationVersion {
            self.version
        }

        fn name(&self) -> &str {
            self.collection
        }

        fn up(&self, ctx: &mut UpgradeContext) -> CoreResult<()> {
            if self.should_fail {
                return Err(CoreError::invalid_operation("intentional failure"));
            }
            ctx.create_collection(CollectionDef::new(self.collection, "id"));
            Ok(())
        }
    }

    fn step(version: MigrationVersion, collection: &'static str) -> Box<dyn Migration> {
        Box::new(Step {
            version,
            collection,
            should_fail: false,
        })
    }

    fn manager() -> MigrationManager {
        let mut manager = MigrationManager::new();
        manager.register(step(1, "machines")).unwrap();
        manager.register(step(2, "counterHistory")).unwrap();
        manager
    }

    #[test]
    fn duplicate_versions_are_rejected() {
        let mut manager = manager();
        assert!(matches!(
            manager.register(step(2, "other")),
            Err(CoreError::MigrationFailed { .. })
        ));
    }

    #[test]
    fn gaps_are_rejected() {
        let mut manager = MigrationManager::new();
        manager.register(step(1, "a")).unwrap();
        manager.register(step(3, "c")).unwrap();
        assert!(manager.validate().is_err());
    }

    #[test]
    fn pending_lists_versions_above_current() {
        let manager = manager();
        assert_eq!(manager.pending(0).len(), 2);
        assert_eq!(manager.pending(1)[0].name, "counterHistory");
        assert!(manager.pending(2).is_empty());
        assert_eq!(manager.latest_version(), 2);
    }

    #[test]
    fn stage_runs_only_the_requested_range() {
        let manager = manager();
        let existing = BTreeMap::from([("machines".to_string(), BTreeSet::new())]);
        let mut ctx = UpgradeContext::new(1, existing);
        let applied = manager.stage(&mut ctx, 2).unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(ctx.created().len(), 1);
        assert_eq!(ctx.created()[0].name, "counterHistory");
    }

    #[test]
    fn stage_refuses_downgrade_and_unknown_targets() {
        let manager = manager();
        let mut ctx = UpgradeContext::new(2, BTreeMap::new());
        assert!(manager.stage(&mut ctx, 1).is_err());
        let mut ctx = UpgradeContext::new(0, BTreeMap::new());
        assert!(manager.stage(&mut ctx, 5).is_err());
    }

    #[test]
    fn failing_migration_is_reported_as_migration_failure() {
        let mut manager = MigrationManager::new();
        manager
            .register(Box::new(Step {
                version: 1,
                collection: "x",
                should_fail: true,
            }))
            .unwrap();
        let mut ctx = UpgradeContext::new(0, BTreeMap::new());
        assert!(matches!(
            manager.stage(&mut ctx, 1),
            Err(CoreError::MigrationFailed { .. })
        ));
    }

    #[test]
    fn existing_collections_are_skipped() {
        let existing = BTreeMap::from([("clients".to_string(), BTreeSet::new())]);
        let mut ctx = UpgradeContext::new(0, existing);
        assert!(!ctx.create_collection(CollectionDef::new("clients", "id")));
        assert!(ctx.create_collection(CollectionDef::new("users", "id")));
        assert!(!ctx.create_collection(CollectionDef::new("users", "id")));
        assert_eq!(ctx.created().len(), 1);
    }

    #[test]
    fn indexes_on_existing_collections_are_staged_separately() {
        let existing = BTreeMap::from([(
            "clients".to_string(),
            BTreeSet::from(["by-name".to_string()]),
        )]);
        let mut ctx = UpgradeContext::new(2, existing);
        assert!(!ctx
            .create_index("clients", IndexDef::new("by-name", "name"))
            .unwrap());
        assert!(ctx
            .create_index("clients", IndexDef::unique("by-tax-id", "taxId"))
            .unwrap());
        assert_eq!(ctx.added_indexes().len(), 1);
        assert!(matches!(
            ctx.create_index("nowhere", IndexDef::new("x", "x")),
            Err(CoreError::CollectionNotFound { .. })
        ));
    }
}
