//! Open, upgrade and seed as an application would on startup.

use rekreativ_core::model::{CompanyProfile, Machine, User, UserRole};
use rekreativ_core::schema::{CLIENTS, COMPANY_PROFILE, COUNTER_HISTORY, MACHINES, USERS};
use rekreativ_core::{
    bootstrap, seed, StoreCell, StoreLocation, CURRENT_VERSION, DEFAULT_ADMIN_ID,
};
use rekreativ_testkit::prelude::*;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

#[test]
fn seeding_twice_adds_nothing_the_second_time() {
    let test_store = TestStore::memory();
    let first = seed(&test_store).unwrap();
    assert_eq!(first.machines, 2);
    assert_eq!(first.clients, 2);
    assert!(first.company_profile);
    assert!(first.admin_user);

    let exported = test_store.export_json().unwrap();
    let second = seed(&test_store).unwrap();
    assert!(second.is_empty());
    assert_eq!(test_store.export_json().unwrap(), exported);
}

#[test]
fn seed_fills_only_empty_collections() {
    let test_store = TestStore::memory();
    test_store.add_entity(&machine("M900", "OWN900")).unwrap();

    let report = seed(&test_store).unwrap();
    assert_eq!(report.machines, 0);
    assert_eq!(report.clients, 2);
    assert_eq!(test_store.count(MACHINES).unwrap(), 1);

    let admin: User = test_store
        .get_entity(&Key::from(DEFAULT_ADMIN_ID))
        .unwrap()
        .unwrap();
    assert_eq!(admin.role, UserRole::Admin);
    let profile: Vec<CompanyProfile> = test_store.all_entities().unwrap();
    assert_eq!(profile.len(), 1);
    assert_eq!(profile[0].vat_percentage, 21.0);
}

#[test]
fn v1_directory_is_upgraded_in_place() {
    let temp = tempdir().unwrap();
    {
        let store = Store::open_with_config(temp.path(), test_config().target_version(1)).unwrap();
        assert!(!store.has_collection(COUNTER_HISTORY));
        store.add_entity(&machine("M001", "PIN001")).unwrap();
        store.add_entity(&client(1, "Bar")).unwrap();
    }

    let store = bootstrap(&StoreLocation::path(temp.path()), test_config()).unwrap();
    assert_eq!(store.version(), CURRENT_VERSION);
    assert!(store.has_collection(COUNTER_HISTORY));
    assert_eq!(store.count(MACHINES).unwrap(), 1);
    assert_eq!(store.count(CLIENTS).unwrap(), 1);
    assert_eq!(store.count(USERS).unwrap(), 1);
    assert_eq!(store.count(COMPANY_PROFILE).unwrap(), 1);

    store
        .record_counter_update(CounterUpdate::new("M001", 25, "manual"))
        .unwrap();
    drop(store);

    let store = Store::open_with_config(temp.path(), test_config()).unwrap();
    let m: Machine = store.get_entity(&Key::from("M001")).unwrap().unwrap();
    assert_eq!(m.current_counter, 25);
    assert_eq!(store.fetch_all_counter_history().unwrap().len(), 1);
}

#[test]
fn shared_cell_bootstraps_once_for_all_threads() {
    let temp = tempdir().unwrap();
    let cell = Arc::new(StoreCell::new(
        StoreLocation::path(temp.path().join("data")),
        test_config(),
    ));
    assert!(cell.get_if_ready().is_none());

    let handles: Vec<_> = (0..6)
        .map(|n| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                let store = cell.get().unwrap();
                store
                    .record_counter_update(CounterUpdate::new("M001", 100 + n, "manual"))
                    .unwrap();
                store
            })
        })
        .collect();
    let stores: Vec<Arc<Store>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for store in &stores[1..] {
        assert!(Arc::ptr_eq(&stores[0], store));
    }

    let store = cell.get().unwrap();
    assert_eq!(store.count(MACHINES).unwrap(), 2);
    assert_eq!(store.count(COUNTER_HISTORY).unwrap(), 6);
    let m: Machine = store.get_entity(&Key::from("M001")).unwrap().unwrap();
    assert_eq!(m.current_counter, 105);
}

#[test]
fn in_memory_cell_starts_seeded() {
    let cell = StoreCell::new(StoreLocation::InMemory, StoreConfig::default());
    let store = cell.get().unwrap();
    assert_eq!(store.count(MACHINES).unwrap(), 2);
    assert_eq!(cell.location(), &StoreLocation::InMemory);
}
