//! Secondary indexes.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::schema::IndexDef;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Ordered secondary index mapping an index value to primary keys.
///
/// Records whose key path is missing or not a key are not indexed at all.
///
/// ```rust,ignore
/// let mut index = SecondaryIndex::new(IndexDef::unique("by-username", "username"));
/// index.insert(Key::from("admin"), Key::from("admin-default"));
/// assert_eq!(index.lookup(&Key::from("admin")).count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SecondaryIndex {
    def: IndexDef,
    entries: BTreeMap<Key, BTreeSet<Key>>,
}

impl SecondaryIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(def: IndexDef) -> Self {
        Self {
            def,
            entries: BTreeMap::new(),
        }
    }

    /// Builds an index over existing records.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if the index is unique and two records share a
    /// value.
    pub fn build<'a, I>(collection: &str, def: IndexDef, records: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (&'a Key, &'a Value)>,
    {
        let mut index = Self::new(def);
        for (primary, record) in records {
            if let Some(value) = index.value_of(record) {
                if index.would_conflict(&value, primary) {
                    return Err(CoreError::constraint_violation(
                        collection,
                        &index.def.name,
                        value,
                    ));
                }
                index.insert(value, primary.clone());
            }
        }
        Ok(index)
    }

    /// Index definition.
    #[must_use]
    pub fn def(&self) -> &IndexDef {
        &self.def
    }

    /// Whether the index rejects duplicate values.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.def.unique
    }

    /// Extracts this index's value from a record.
    #[must_use]
    pub fn value_of(&self, record: &Value) -> Option<Key> {
        Key::at_path(record, &self.def.key_path)
    }

    /// True when a unique index already maps `value` to another record.
    #[must_use]
    pub fn would_conflict(&self, value: &Key, primary: &Key) -> bool {
        self.def.unique
            && self
                .entries
                .get(value)
                .is_some_and(|holders| holders.iter().any(|holder| holder != primary))
    }

    /// Adds a mapping without checking uniqueness.
    pub fn insert(&mut self, value: Key, primary: Key) {
        self.entries.entry(value).or_default().insert(primary);
    }

    /// Removes a mapping. Empty buckets are dropped.
    pub fn remove(&mut self, value: &Key, primary: &Key) {
        if let Some(holders) = self.entries.get_mut(value) {
            holders.remove(primary);
            if holders.is_empty() {
                self.entries.remove(value);
            }
        }
    }

    /// Primary keys of records holding `value`, in key order.
    pub fn lookup(&self, value: &Key) -> impl Iterator<Item = &Key> {
        self.entries.get(value).into_iter().flatten()
    }

    /// Number of distinct indexed values.
    #[must_use]
    pub fn distinct_values(&self) -> usize {
        self.entries.len()
    }

    /// Drops every mapping.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
