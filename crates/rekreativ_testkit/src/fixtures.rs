//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores and the
//! records most tests need.

use rekreativ_core::model::{
    Client, HistoryEvent, Machine, MachineStatus, User, UserRole,
};
use rekreativ_core::{seed, Store, StoreConfig};
use serde_json::Map;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: Store::open_in_memory().expect("Failed to open in-memory store"),
            temp_dir: None,
        }
    }

    /// Creates a new on-disk test store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::open_with_config(temp_dir.path(), test_config())
            .expect("Failed to open file store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// Creates an in-memory store with the seed data applied.
    pub fn seeded() -> Self {
        let test_store = Self::memory();
        seed(&test_store.store).expect("Failed to seed store");
        test_store
    }

    /// Returns the store directory if on disk, None if in memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Closes and reopens an on-disk store, replaying its log.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores.
    #[must_use]
    pub fn reopen(self) -> Self {
        let Self { store, temp_dir } = self;
        let temp_dir = temp_dir.expect("Only on-disk stores can be reopened");
        drop(store);
        let store = Store::open_with_config(temp_dir.path(), test_config())
            .expect("Failed to reopen store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Configuration used by on-disk fixtures. Skips fsync to keep tests fast.
pub fn test_config() -> StoreConfig {
    StoreConfig::default().sync_on_commit(false)
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a seeded in-memory store.
pub fn with_seeded_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let test_store = TestStore::seeded();
    f(&test_store.store)
}

/// Runs a test with a temporary on-disk store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, &path)
}

/// A warehouse machine with zeroed counters.
pub fn machine(id: &str, serial: &str) -> Machine {
    Machine {
        id: id.to_string(),
        serial_number: serial.to_string(),
        machine_type: "pinball".to_string(),
        model: "Test Model".to_string(),
        brand: "Test Brand".to_string(),
        cost: 1000.0,
        purchase_date: None,
        status: MachineStatus::Warehouse,
        client_id: None,
        current_counter: 0,
        initial_counter: 0,
        split_percentage: 50.0,
        created_at: "2024-01-01T00:00:00.000Z".to_string(),
        updated_at: "2024-01-01T00:00:00.000Z".to_string(),
        history: vec![HistoryEvent {
            date: "2024-01-01T00:00:00.000Z".to_string(),
            action: "created".to_string(),
            details: "test fixture".to_string(),
        }],
        extra: Map::new(),
    }
}

/// A machine whose counters both start at `initial`.
pub fn machine_at(id: &str, serial: &str, initial: u64) -> Machine {
    Machine {
        current_counter: initial,
        initial_counter: initial,
        ..machine(id, serial)
    }
}

/// A client with only the required fields.
pub fn client(id: i64, name: &str) -> Client {
    Client {
        id,
        name: name.to_string(),
        business_type: None,
        owner: None,
        address: None,
        city: None,
        postal_code: None,
        phone: None,
        email: None,
        machines: 0,
        created_at: String::new(),
        updated_at: String::new(),
        extra: Map::new(),
    }
}

/// A technician account.
pub fn user(id: &str, username: &str, password: &str) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        name: username.to_string(),
        role: UserRole::Technician,
        created_at: String::new(),
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekreativ_core::schema::{MACHINES, USERS};
    use rekreativ_core::Key;

    #[test]
    fn memory_store_is_empty() {
        with_temp_store(|store| {
            assert_eq!(store.count(MACHINES).unwrap(), 0);
        });
    }

    #[test]
    fn seeded_store_has_admin() {
        with_seeded_store(|store| {
            assert_eq!(store.count(USERS).unwrap(), 1);
            assert_eq!(store.count(MACHINES).unwrap(), 2);
        });
    }

    #[test]
    fn file_store_survives_reopen() {
        let test_store = TestStore::file();
        test_store.add_entity(&machine("M100", "SER100")).unwrap();
        let test_store = test_store.reopen();
        let stored: Machine = test_store.get_entity(&Key::from("M100")).unwrap().unwrap();
        assert_eq!(stored, machine("M100", "SER100"));
    }

    #[test]
    fn machine_at_sets_both_counters() {
        let m = machine_at("M1", "S1", 40);
        assert_eq!((m.current_counter, m.initial_counter), (40, 40));
    }
}
