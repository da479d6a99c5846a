//! The store facade.

use crate::collection::CollectionState;
use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{CoreError, CoreResult};
use crate::index::SecondaryIndex;
use crate::key::Key;
use crate::migration::{MigrationManager, MigrationRunResult, MigrationVersion, UpgradeContext};
use crate::model::{Entity, Machine};
use crate::schema::{app_migrations, CollectionDef, IndexDef, BY_CLIENT_ID};
use crate::transaction::{Transaction, TransactionManager};
use crate::types::{SequenceNumber, TransactionId, TransactionMode};
use crate::wal::{WalManager, WalRecord};
use parking_lot::RwLock;
use rekreativ_storage::{FileBackend, InMemoryBackend, StorageBackend};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Schema version plus every collection's state.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    pub(crate) version: MigrationVersion,
    pub(crate) collections: BTreeMap<String, RwLock<CollectionState>>,
}

impl Catalog {
    fn index_names(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.collections
            .iter()
            .map(|(name, lock)| {
                let indexes = lock
                    .read()
                    .def()
                    .indexes
                    .iter()
                    .map(|index| index.name.clone())
                    .collect();
                (name.clone(), indexes)
            })
            .collect()
    }

    fn state_mut(&mut self, name: &str) -> CoreResult<&mut CollectionState> {
        self.collections
            .get_mut(name)
            .map(RwLock::get_mut)
            .ok_or_else(|| {
                CoreError::wal_corruption(format!("log references unknown collection {name}"))
            })
    }

    /// Applies one replayed record. Returns the ids of a commit.
    fn replay(
        &mut self,
        record: WalRecord,
    ) -> CoreResult<Option<(TransactionId, SequenceNumber)>> {
        match record {
            WalRecord::Upgrade {
                from,
                to,
                collections,
                indexes,
            } => {
                if from != self.version {
                    return Err(CoreError::wal_corruption(format!(
                        "upgrade from version {from} found while store is at {}",
                        self.version
                    )));
                }
                for def in collections {
                    if self.collections.contains_key(&def.name) {
                        return Err(CoreError::wal_corruption(format!(
                            "collection {} created twice",
                            def.name
                        )));
                    }
                    self.collections
                        .insert(def.name.clone(), RwLock::new(CollectionState::new(def)));
                }
                for addition in indexes {
                    let state = self.state_mut(&addition.collection)?;
                    let index =
                        SecondaryIndex::build(&addition.collection, addition.index, state.iter())?;
                    state.attach_index(index);
                }
                self.version = to;
                Ok(None)
            }
            WalRecord::Commit {
                txid,
                sequence,
                ops,
            } => {
                for op in ops {
                    let name = op.collection().to_string();
                    self.state_mut(&name)?.apply(op);
                }
                Ok(Some((txid, sequence)))
            }
        }
    }
}

/// Shape and size of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Collection name.
    pub name: String,
    /// Primary key path.
    pub key_path: String,
    /// Secondary indexes.
    pub indexes: Vec<IndexDef>,
    /// Number of records.
    pub records: usize,
}

/// A versioned multi-collection record store.
///
/// All state lives in memory and is rebuilt from the write-ahead log on
/// open. Every method takes `&self`; share a store with `Arc`.
///
/// ```rust,ignore
/// use rekreativ_core::{Store, TransactionMode, schema::MACHINES};
///
/// let store = Store::open("data/rekreativ")?;
/// let count = store.with_transaction(&[MACHINES], TransactionMode::ReadOnly, |tx| {
///     tx.count(MACHINES)
/// })?;
/// ```
pub struct Store {
    dir: Option<StoreDir>,
    wal: WalManager,
    catalog: RwLock<Catalog>,
    txns: TransactionManager,
    config: StoreConfig,
    closed: AtomicBool,
}

impl Store {
    /// Opens a store directory with default configuration, upgrading it to
    /// the current schema.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a store directory, upgrading it to `config.target_version`.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> CoreResult<Self> {
        let migrations = app_migrations().map_err(CoreError::open_failed)?;
        Self::open_with_migrations(path, config, &migrations)
    }

    /// Opens a store directory using a custom migration set.
    ///
    /// # Errors
    ///
    /// Every failure is reported as `OpenFailed` wrapping the cause.
    pub fn open_with_migrations(
        path: impl AsRef<Path>,
        config: StoreConfig,
        migrations: &MigrationManager,
    ) -> CoreResult<Self> {
        let path = path.as_ref();
        Self::open_dir(path, config, migrations).map_err(CoreError::open_failed)
    }

    /// Opens an empty store that lives only in memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_in_memory_with_config(StoreConfig::default())
    }

    /// Opens an in-memory store with the given configuration.
    pub fn open_in_memory_with_config(config: StoreConfig) -> CoreResult<Self> {
        let migrations = app_migrations().map_err(CoreError::open_failed)?;
        Self::open_with_backend(Box::new(InMemoryBackend::new()), config, &migrations)
    }

    /// Opens a store over an arbitrary log backend.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        config: StoreConfig,
        migrations: &MigrationManager,
    ) -> CoreResult<Self> {
        Self::assemble(None, backend, config, migrations).map_err(CoreError::open_failed)
    }

    fn open_dir(
        path: &Path,
        config: StoreConfig,
        migrations: &MigrationManager,
    ) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.wal_path())?;
        Self::assemble(Some(dir), Box::new(backend), config, migrations)
    }

    fn assemble(
        dir: Option<StoreDir>,
        backend: Box<dyn StorageBackend>,
        config: StoreConfig,
        migrations: &MigrationManager,
    ) -> CoreResult<Self> {
        let wal = WalManager::new(backend, config.sync_on_commit);

        let mut catalog = Catalog::default();
        let mut last_txid = 0;
        let mut last_seq = 0;
        let replay = wal.replay(|record| {
            if let Some((txid, sequence)) = catalog.replay(record)? {
                last_txid = last_txid.max(txid.as_u64());
                last_seq = last_seq.max(sequence.as_u64());
            }
            Ok(())
        })?;
        info!(
            records = replay.records,
            torn_bytes = replay.torn_bytes,
            version = catalog.version,
            collections = catalog.collections.len(),
            "store log replayed"
        );

        let target = config.target_version;
        let store = Self {
            dir,
            wal,
            catalog: RwLock::new(catalog),
            txns: TransactionManager::with_state(last_txid + 1, last_seq + 1),
            config,
            closed: AtomicBool::new(false),
        };
        store.migrate(migrations, target)?;
        Ok(store)
    }

    /// Upgrades the schema to `target`.
    ///
    /// All migrations in `(current, target]` are staged together, new
    /// indexes on existing collections are built and checked, and the
    /// result is committed as one log record. On any failure the store
    /// stays at its previous version. A store already at `target` is left
    /// untouched.
    pub fn migrate(
        &self,
        migrations: &MigrationManager,
        target: MigrationVersion,
    ) -> CoreResult<MigrationRunResult> {
        self.ensure_open()?;
        let mut catalog = self.catalog.write();
        let from = catalog.version;
        if target == from {
            debug!(version = from, "schema already current");
            return Ok(MigrationRunResult {
                from_version: from,
                final_version: from,
                ..MigrationRunResult::default()
            });
        }

        let mut ctx = UpgradeContext::new(from, catalog.index_names());
        let applied = migrations.stage(&mut ctx, target)?;
        let (created, added_indexes, operations) = ctx.into_parts();

        let mut built = Vec::with_capacity(added_indexes.len());
        for addition in &added_indexes {
            let lock = catalog
                .collections
                .get(&addition.collection)
                .ok_or_else(|| CoreError::collection_not_found(&addition.collection))?;
            let index = SecondaryIndex::build(
                &addition.collection,
                addition.index.clone(),
                lock.read().iter(),
            )
            .map_err(|e| {
                CoreError::migration_failed(format!(
                    "cannot create index {} on {}: {e}",
                    addition.index.name, addition.collection
                ))
            })?;
            built.push((addition.collection.clone(), index));
        }

        self.wal.append(&WalRecord::Upgrade {
            from,
            to: target,
            collections: created.clone(),
            indexes: added_indexes,
        })?;

        let created_count = created.len();
        for def in created {
            catalog
                .collections
                .insert(def.name.clone(), RwLock::new(CollectionState::new(def)));
        }
        for (name, index) in built {
            if let Some(lock) = catalog.collections.get_mut(&name) {
                lock.get_mut().attach_index(index);
            }
        }
        catalog.version = target;

        info!(
            from,
            to = target,
            migrations = applied.len(),
            created = created_count,
            "schema upgraded"
        );
        Ok(MigrationRunResult {
            from_version: from,
            final_version: target,
            applied,
            operations,
        })
    }

    /// Runs `body` inside a transaction over `collections`.
    ///
    /// On `Ok` the staged writes are committed atomically. On `Err` the
    /// transaction is aborted first and the error is returned unchanged.
    /// A body that aborts explicitly and returns `Ok` yields
    /// `TransactionAborted`.
    ///
    /// Collections are locked in name order. Calling `with_transaction`
    /// from inside a body on an overlapping collection deadlocks.
    pub fn with_transaction<T, F>(
        &self,
        collections: &[&str],
        mode: TransactionMode,
        body: F,
    ) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    {
        self.ensure_open()?;
        let catalog = self.catalog.read_recursive();
        let mut txn = Transaction::begin(self.txns.next_id(), mode, &catalog, collections)?;
        debug!(txid = %txn.id(), %mode, ?collections, "transaction started");

        match body(&mut txn) {
            Ok(value) => {
                if !txn.is_active() {
                    debug!(txid = %txn.id(), "transaction was aborted by its body");
                    return Err(CoreError::transaction_aborted(format!(
                        "{} was aborted",
                        txn.id()
                    )));
                }
                self.txns.commit(&self.wal, &mut txn)?;
                Ok(value)
            }
            Err(err) => {
                txn.abort();
                debug!(txid = %txn.id(), error = %err, "transaction aborted");
                Err(err)
            }
        }
    }

    /// Reads one record.
    pub fn get(&self, collection: &str, key: &Key) -> CoreResult<Option<Value>> {
        self.with_transaction(&[collection], TransactionMode::ReadOnly, |tx| {
            tx.get(collection, key)
        })
    }

    /// Reads every record of a collection in key order.
    pub fn get_all(&self, collection: &str) -> CoreResult<Vec<Value>> {
        self.with_transaction(&[collection], TransactionMode::ReadOnly, |tx| {
            tx.get_all(collection)
        })
    }

    /// Reads records by secondary index value.
    pub fn get_all_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &Key,
    ) -> CoreResult<Vec<Value>> {
        self.with_transaction(&[collection], TransactionMode::ReadOnly, |tx| {
            tx.get_all_by_index(collection, index, value)
        })
    }

    /// Inserts a new record.
    pub fn add(&self, collection: &str, record: Value) -> CoreResult<Key> {
        self.with_transaction(&[collection], TransactionMode::ReadWrite, |tx| {
            tx.add(collection, record)
        })
    }

    /// Inserts or replaces a record.
    pub fn put(&self, collection: &str, record: Value) -> CoreResult<Key> {
        self.with_transaction(&[collection], TransactionMode::ReadWrite, |tx| {
            tx.put(collection, record)
        })
    }

    /// Deletes a record.
    pub fn delete(&self, collection: &str, key: &Key) -> CoreResult<()> {
        self.with_transaction(&[collection], TransactionMode::ReadWrite, |tx| {
            tx.delete(collection, key)
        })
    }

    /// Deletes every record of a collection.
    pub fn clear(&self, collection: &str) -> CoreResult<()> {
        self.with_transaction(&[collection], TransactionMode::ReadWrite, |tx| {
            tx.clear(collection)
        })
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &str) -> CoreResult<usize> {
        self.with_transaction(&[collection], TransactionMode::ReadOnly, |tx| {
            tx.count(collection)
        })
    }

    /// Reads a typed record.
    pub fn get_entity<E: Entity>(&self, key: &Key) -> CoreResult<Option<E>> {
        self.with_transaction(&[E::COLLECTION], TransactionMode::ReadOnly, |tx| {
            tx.get_entity(key)
        })
    }

    /// Reads every typed record of a collection.
    pub fn all_entities<E: Entity>(&self) -> CoreResult<Vec<E>> {
        self.with_transaction(&[E::COLLECTION], TransactionMode::ReadOnly, |tx| {
            tx.all_entities()
        })
    }

    /// Inserts a typed record.
    pub fn add_entity<E: Entity>(&self, entity: &E) -> CoreResult<Key> {
        self.with_transaction(&[E::COLLECTION], TransactionMode::ReadWrite, |tx| {
            tx.add_entity(entity)
        })
    }

    /// Inserts or replaces a typed record.
    pub fn put_entity<E: Entity>(&self, entity: &E) -> CoreResult<Key> {
        self.with_transaction(&[E::COLLECTION], TransactionMode::ReadWrite, |tx| {
            tx.put_entity(entity)
        })
    }

    /// Number of machines assigned to a client, computed from the
    /// machines' `clientId` index rather than a stored counter.
    pub fn client_machine_count(&self, client_id: i64) -> CoreResult<usize> {
        let key = Key::Text(client_id.to_string());
        self.with_transaction(&[Machine::COLLECTION], TransactionMode::ReadOnly, |tx| {
            Ok(tx
                .get_all_by_index(Machine::COLLECTION, BY_CLIENT_ID, &key)?
                .len())
        })
    }

    /// Current schema version.
    #[must_use]
    pub fn version(&self) -> MigrationVersion {
        self.catalog.read_recursive().version
    }

    /// Names of every collection.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.catalog.read_recursive().collections.keys().cloned().collect()
    }

    /// True if a collection exists.
    #[must_use]
    pub fn has_collection(&self, name: &str) -> bool {
        self.catalog.read_recursive().collections.contains_key(name)
    }

    /// Definition of a collection.
    pub fn collection_def(&self, name: &str) -> CoreResult<CollectionDef> {
        let catalog = self.catalog.read_recursive();
        let lock = catalog
            .collections
            .get(name)
            .ok_or_else(|| CoreError::collection_not_found(name))?;
        let def = lock.read().def().clone();
        Ok(def)
    }

    /// Shape and size of every collection.
    pub fn describe(&self) -> CoreResult<Vec<CollectionSummary>> {
        self.ensure_open()?;
        let catalog = self.catalog.read_recursive();
        Ok(catalog
            .collections
            .values()
            .map(|lock| {
                let state = lock.read();
                CollectionSummary {
                    name: state.name().to_string(),
                    key_path: state.def().key_path.clone(),
                    indexes: state.def().indexes.clone(),
                    records: state.len(),
                }
            })
            .collect())
    }

    /// Configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Directory of an on-disk store.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.path().to_path_buf())
    }

    /// Size of the write-ahead log in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.wal.size()
    }

    /// Flushes the log and rejects further operations.
    pub fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.wal.flush()?;
        info!("store closed");
        Ok(())
    }

    /// True once [`Store::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            return Err(CoreError::StoreClosed);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn raw_log(&self) -> CoreResult<Vec<u8>> {
        self.wal.raw_bytes()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.wal.flush();
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.dir.as_ref().map(StoreDir::path))
            .field("version", &self.version())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
