//! Transaction state and in-scope operations.

use crate::collection::CollectionState;
use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::model::Entity;
use crate::store::Catalog;
use crate::types::{TransactionId, TransactionMode};
use crate::wal::WalOp;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use serde_json::Value;
use std::collections::BTreeMap;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// Insert or replace a record.
    Put {
        /// Full record.
        record: Value,
    },
    /// Delete a record.
    Delete,
}

#[derive(Debug, Default)]
struct CollectionWrites {
    cleared: bool,
    writes: BTreeMap<Key, PendingWrite>,
}

enum Scoped<'a> {
    Read(RwLockReadGuard<'a, CollectionState>),
    Write(RwLockWriteGuard<'a, CollectionState>),
}

impl Scoped<'_> {
    fn state(&self) -> &CollectionState {
        match self {
            Self::Read(guard) => guard,
            Self::Write(guard) => guard,
        }
    }
}

/// An open transaction over a fixed set of collections.
///
/// Writes are staged and visible to this transaction's own reads at once,
/// and to everyone else only after commit.
///
/// A failed write (constraint, duplicate key, scope or mode violation)
/// aborts the transaction; later operations report `TransactionAborted`.
pub struct Transaction<'a> {
    id: TransactionId,
    mode: TransactionMode,
    state: TransactionState,
    scope: BTreeMap<&'a str, Scoped<'a>>,
    pending: BTreeMap<String, CollectionWrites>,
    log: Vec<WalOp>,
}

impl<'a> Transaction<'a> {
    /// Locks `collections` in name order and opens a transaction over them.
    pub(crate) fn begin(
        id: TransactionId,
        mode: TransactionMode,
        catalog: &'a Catalog,
        collections: &[&str],
    ) -> CoreResult<Self> {
        let mut names = collections.to_vec();
        names.sort_unstable();
        names.dedup();

        let mut scope = BTreeMap::new();
        for name in names {
            let (name, lock) = catalog
                .collections
                .get_key_value(name)
                .ok_or_else(|| CoreError::collection_not_found(name))?;
            let guard = match mode {
                TransactionMode::ReadOnly => Scoped::Read(lock.read()),
                TransactionMode::ReadWrite => Scoped::Write(lock.write()),
            };
            scope.insert(name.as_str(), guard);
        }

        Ok(Self {
            id,
            mode,
            state: TransactionState::Active,
            scope,
            pending: BTreeMap::new(),
            log: Vec::new(),
        })
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Collections in scope, in lock order.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.scope.keys().copied()
    }

    /// Number of staged operations.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.log.len()
    }

    /// Staged write for `key`, if any.
    #[must_use]
    pub fn pending_write(&self, collection: &str, key: &Key) -> Option<&PendingWrite> {
        self.pending.get(collection)?.writes.get(key)
    }

    /// Reads a record.
    pub fn get(&self, collection: &str, key: &Key) -> CoreResult<Option<Value>> {
        self.ensure_active()?;
        Ok(self.visible(collection, key)?.cloned())
    }

    /// Reads every record in primary-key order.
    pub fn get_all(&self, collection: &str) -> CoreResult<Vec<Value>> {
        self.ensure_active()?;
        Ok(self.merged(collection)?.into_values().cloned().collect())
    }

    /// Reads the records whose `index` value equals `value`, in
    /// primary-key order.
    pub fn get_all_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &Key,
    ) -> CoreResult<Vec<Value>> {
        self.ensure_active()?;
        let state = self.collection(collection)?;
        let index = state.index(index)?;
        let staged = self.pending.get(collection);

        let mut found = BTreeMap::new();
        if !staged.is_some_and(|w| w.cleared) {
            for primary in index.lookup(value) {
                if staged.is_some_and(|w| w.writes.contains_key(primary)) {
                    continue;
                }
                if let Some(record) = state.get(primary) {
                    found.insert(primary, record);
                }
            }
        }
        for (primary, write) in staged.into_iter().flat_map(|w| &w.writes) {
            if let PendingWrite::Put { record } = write {
                if index.value_of(record).as_ref() == Some(value) {
                    found.insert(primary, record);
                }
            }
        }
        Ok(found.into_values().cloned().collect())
    }

    /// Number of records.
    pub fn count(&self, collection: &str) -> CoreResult<usize> {
        self.ensure_active()?;
        Ok(self.merged(collection)?.len())
    }

    /// Largest primary key currently visible.
    pub fn last_key(&self, collection: &str) -> CoreResult<Option<Key>> {
        self.ensure_active()?;
        let state = self.collection(collection)?;
        let staged = self.pending.get(collection);

        let staged_last = staged.and_then(|w| {
            w.writes
                .iter()
                .rev()
                .find(|(_, write)| matches!(write, PendingWrite::Put { .. }))
                .map(|(key, _)| key)
        });
        let committed_last = if staged.is_some_and(|w| w.cleared) {
            None
        } else {
            state
                .keys_descending()
                .find(|key| !staged.is_some_and(|w| w.writes.contains_key(*key)))
        };
        Ok(staged_last.max(committed_last).cloned())
    }

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` if the primary key is taken, `ConstraintViolation` if
    /// a unique index already holds one of its values.
    pub fn add(&mut self, collection: &str, record: Value) -> CoreResult<Key> {
        self.ensure_writable(collection)?;
        let key = self.checked(|txn| {
            let key = txn.collection(collection)?.primary_key(&record)?;
            if txn.visible(collection, &key)?.is_some() {
                return Err(CoreError::duplicate_key(collection, &key));
            }
            txn.check_unique(collection, &key, &record)?;
            Ok(key)
        })?;
        self.stage_put(collection, key.clone(), record);
        Ok(key)
    }

    /// Inserts or replaces a record.
    pub fn put(&mut self, collection: &str, record: Value) -> CoreResult<Key> {
        self.ensure_writable(collection)?;
        let key = self.checked(|txn| {
            let key = txn.collection(collection)?.primary_key(&record)?;
            txn.check_unique(collection, &key, &record)?;
            Ok(key)
        })?;
        self.stage_put(collection, key.clone(), record);
        Ok(key)
    }

    /// Deletes a record. Deleting a missing key is not an error.
    pub fn delete(&mut self, collection: &str, key: &Key) -> CoreResult<()> {
        self.ensure_writable(collection)?;
        self.pending
            .entry(collection.to_string())
            .or_default()
            .writes
            .insert(key.clone(), PendingWrite::Delete);
        self.log.push(WalOp::Delete {
            collection: collection.to_string(),
            key: key.clone(),
        });
        Ok(())
    }

    /// Deletes every record in the collection.
    pub fn clear(&mut self, collection: &str) -> CoreResult<()> {
        self.ensure_writable(collection)?;
        let staged = self.pending.entry(collection.to_string()).or_default();
        staged.cleared = true;
        staged.writes.clear();
        self.log.push(WalOp::Clear {
            collection: collection.to_string(),
        });
        Ok(())
    }

    /// Drops every staged write. The transaction cannot be used afterwards.
    pub fn abort(&mut self) {
        if self.state == TransactionState::Active {
            self.state = TransactionState::Aborted;
        }
        self.pending.clear();
        self.log.clear();
    }

    /// Reads a typed record.
    pub fn get_entity<E: Entity>(&self, key: &Key) -> CoreResult<Option<E>> {
        self.get(E::COLLECTION, key)?
            .map(E::from_record)
            .transpose()
    }

    /// Reads every record of a typed collection.
    pub fn all_entities<E: Entity>(&self) -> CoreResult<Vec<E>> {
        self.get_all(E::COLLECTION)?
            .into_iter()
            .map(E::from_record)
            .collect()
    }

    /// Reads typed records by index value.
    pub fn entities_by_index<E: Entity>(&self, index: &str, value: &Key) -> CoreResult<Vec<E>> {
        self.get_all_by_index(E::COLLECTION, index, value)?
            .into_iter()
            .map(E::from_record)
            .collect()
    }

    /// Inserts a typed record.
    pub fn add_entity<E: Entity>(&mut self, entity: &E) -> CoreResult<Key> {
        let record = entity.to_record()?;
        self.add(E::COLLECTION, record)
    }

    /// Inserts or replaces a typed record.
    pub fn put_entity<E: Entity>(&mut self, entity: &E) -> CoreResult<Key> {
        let record = entity.to_record()?;
        self.put(E::COLLECTION, record)
    }

    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(format!(
                "{} is already committed",
                self.id
            ))),
            TransactionState::Aborted => Err(CoreError::transaction_aborted(format!(
                "{} was aborted",
                self.id
            ))),
        }
    }

    pub(crate) fn take_log(&mut self) -> Vec<WalOp> {
        std::mem::take(&mut self.log)
    }

    /// Applies logged operations to the locked collections.
    pub(crate) fn apply(&mut self, ops: Vec<WalOp>) {
        for op in ops {
            if let Some(Scoped::Write(state)) = self.scope.get_mut(op.collection()) {
                state.apply(op);
            }
        }
        self.pending.clear();
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    fn collection(&self, name: &str) -> CoreResult<&CollectionState> {
        self.scope
            .get(name)
            .map(Scoped::state)
            .ok_or_else(|| CoreError::not_in_scope(name))
    }

    fn ensure_writable(&mut self, collection: &str) -> CoreResult<()> {
        self.ensure_active()?;
        let violation = if self.mode == TransactionMode::ReadOnly {
            Some(CoreError::invalid_operation(format!(
                "cannot write to {collection} in a read-only transaction"
            )))
        } else if !self.scope.contains_key(collection) {
            Some(CoreError::not_in_scope(collection))
        } else {
            None
        };
        match violation {
            Some(err) => {
                self.abort();
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Runs a validation step and aborts if it fails.
    fn checked<T>(&mut self, step: impl FnOnce(&Self) -> CoreResult<T>) -> CoreResult<T> {
        let result = step(&*self);
        if result.is_err() {
            self.abort();
        }
        result
    }

    fn stage_put(&mut self, collection: &str, key: Key, record: Value) {
        self.pending
            .entry(collection.to_string())
            .or_default()
            .writes
            .insert(
                key.clone(),
                PendingWrite::Put {
                    record: record.clone(),
                },
            );
        self.log.push(WalOp::Put {
            collection: collection.to_string(),
            key,
            record,
        });
    }

    fn visible(&self, collection: &str, key: &Key) -> CoreResult<Option<&Value>> {
        let state = self.collection(collection)?;
        if let Some(staged) = self.pending.get(collection) {
            if let Some(write) = staged.writes.get(key) {
                return Ok(match write {
                    PendingWrite::Put { record } => Some(record),
                    PendingWrite::Delete => None,
                });
            }
            if staged.cleared {
                return Ok(None);
            }
        }
        Ok(state.get(key))
    }

    fn merged(&self, collection: &str) -> CoreResult<BTreeMap<&Key, &Value>> {
        let state = self.collection(collection)?;
        let staged = self.pending.get(collection);

        let mut records: BTreeMap<&Key, &Value> = if staged.is_some_and(|w| w.cleared) {
            BTreeMap::new()
        } else {
            state.iter().collect()
        };
        for (key, write) in staged.into_iter().flat_map(|w| &w.writes) {
            match write {
                PendingWrite::Put { record } => {
                    records.insert(key, record);
                }
                PendingWrite::Delete => {
                    records.remove(key);
                }
            }
        }
        Ok(records)
    }

    fn check_unique(&self, collection: &str, key: &Key, record: &Value) -> CoreResult<()> {
        let state = self.collection(collection)?;
        let staged = self.pending.get(collection);
        let cleared = staged.is_some_and(|w| w.cleared);

        for index in state.indexes().filter(|index| index.is_unique()) {
            let Some(value) = index.value_of(record) else {
                continue;
            };
            let committed_clash = !cleared
                && index.lookup(&value).any(|holder| {
                    holder != key && !staged.is_some_and(|w| w.writes.contains_key(holder))
                });
            let staged_clash = staged
                .into_iter()
                .flat_map(|w| &w.writes)
                .any(|(holder, write)| {
                    holder != key
                        && matches!(write, PendingWrite::Put { record: other }
                            if index.value_of(other).as_ref() == Some(&value))
                });
            if committed_clash || staged_clash {
                return Err(CoreError::constraint_violation(
                    collection,
                    &index.def().name,
                    value,
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("collections", &self.scope.keys().collect::<Vec<_>>())
            .field("writes", &self.log.len())
            .finish()
    }
}
