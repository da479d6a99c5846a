//! In-memory state of one collection.

use crate::error::{CoreError, CoreResult};
use crate::index::SecondaryIndex;
use crate::key::Key;
use crate::schema::CollectionDef;
use crate::wal::WalOp;
use serde_json::Value;
use std::collections::BTreeMap;

/// Committed records of a collection plus their secondary indexes.
///
/// Mutations here are infallible: every constraint is checked while a
/// transaction stages its writes, before anything reaches the log.
#[derive(Debug, Clone)]
pub struct CollectionState {
    def: CollectionDef,
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, SecondaryIndex>,
}

impl CollectionState {
    /// Creates an empty collection with empty indexes.
    #[must_use]
    pub fn new(def: CollectionDef) -> Self {
        let indexes = def
            .indexes
            .iter()
            .map(|index| (index.name.clone(), SecondaryIndex::new(index.clone())))
            .collect();
        Self {
            def,
            records: BTreeMap::new(),
            indexes,
        }
    }

    /// Schema definition.
    #[must_use]
    pub fn def(&self) -> &CollectionDef {
        &self.def
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.records.get(key)
    }

    /// True if a record is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.records.contains_key(key)
    }

    /// Records in primary-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.records.iter()
    }

    /// Primary keys, largest first.
    pub fn keys_descending(&self) -> impl Iterator<Item = &Key> {
        self.records.keys().rev()
    }

    /// Extracts the primary key of `record`.
    pub fn primary_key(&self, record: &Value) -> CoreResult<Key> {
        if !record.is_object() {
            return Err(CoreError::invalid_key(
                self.name(),
                "records must be JSON objects",
            ));
        }
        Key::at_path(record, &self.def.key_path).ok_or_else(|| {
            CoreError::invalid_key(
                self.name(),
                format!("key path `{}` is missing or not a key", self.def.key_path),
            )
        })
    }

    /// Looks up a secondary index by name.
    pub fn index(&self, name: &str) -> CoreResult<&SecondaryIndex> {
        self.indexes
            .get(name)
            .ok_or_else(|| CoreError::index_not_found(self.name(), name))
    }

    /// Secondary indexes.
    pub fn indexes(&self) -> impl Iterator<Item = &SecondaryIndex> {
        self.indexes.values()
    }

    /// Stores `record` under `key`, replacing any previous record.
    pub fn put(&mut self, key: Key, record: Value) {
        self.unindex(&key);
        for index in self.indexes.values_mut() {
            if let Some(value) = index.value_of(&record) {
                index.insert(value, key.clone());
            }
        }
        self.records.insert(key, record);
    }

    /// Removes the record under `key`.
    pub fn delete(&mut self, key: &Key) -> Option<Value> {
        self.unindex(key);
        self.records.remove(key)
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }

    /// Applies a logged operation addressed to this collection.
    pub fn apply(&mut self, op: WalOp) {
        match op {
            WalOp::Put { key, record, .. } => self.put(key, record),
            WalOp::Delete { key, .. } => {
                self.delete(&key);
            }
            WalOp::Clear { .. } => self.clear(),
        }
    }

    /// Adds an index already built over this collection's records.
    pub fn attach_index(&mut self, index: SecondaryIndex) {
        let def = index.def().clone();
        self.def.indexes.retain(|existing| existing.name != def.name);
        self.def.indexes.push(def.clone());
        self.indexes.insert(def.name, index);
    }

    fn unindex(&mut self, key: &Key) {
        let Some(old) = self.records.get(key) else {
            return;
        };
        for index in self.indexes.values_mut() {
            if let Some(value) = index.value_of(old) {
                index.remove(&value, key);
            }
        }
    }
}
