//! Export and import across stores.

use proptest::prelude::*;
use rekreativ_core::model::{Client, Machine, User};
use rekreativ_core::schema::{CLIENTS, COUNTER_HISTORY, MACHINES, USERS};
use rekreativ_core::{CoreError, DEFAULT_ADMIN_ID, DEFAULT_PLACEHOLDER_CREDENTIAL};
use rekreativ_testkit::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;

#[test]
fn export_import_keeps_records_and_passwords() {
    let source = TestStore::seeded();
    source
        .record_counter_update(CounterUpdate::new("M001", 700, "manual"))
        .unwrap();
    source.add_entity(&user("u-2", "tecnico", "s3cret")).unwrap();
    let text = source.export_json().unwrap();

    let document: Value = serde_json::from_str(&text).unwrap();
    assert!(document[USERS]
        .as_array()
        .unwrap()
        .iter()
        .all(|u| u.get("password").is_none()));
    assert_eq!(document[COUNTER_HISTORY].as_array().unwrap().len(), 1);

    // Target knows the admin but not the technician.
    let target = TestStore::seeded();
    let report = target.import_json(&text).unwrap();
    assert!(report.is_applied());
    assert_eq!(report.credentials.preserved, 1);
    assert_eq!(report.credentials.placeholder, 1);
    assert_eq!(report.credentials.from_document, 0);

    let admin: User = target.get_entity(&Key::from(DEFAULT_ADMIN_ID)).unwrap().unwrap();
    assert_eq!(admin.password, "admin");
    let tech: User = target.get_entity(&Key::from("u-2")).unwrap().unwrap();
    assert_eq!(tech.password, DEFAULT_PLACEHOLDER_CREDENTIAL);

    let machine: Machine = target.get_entity(&Key::from("M001")).unwrap().unwrap();
    assert_eq!(machine.current_counter, 700);
    assert_eq!(target.count(COUNTER_HISTORY).unwrap(), 1);
    assert_eq!(target.export_json().unwrap(), text);
}

#[test]
fn clients_only_import_leaves_the_rest() {
    let test_store = TestStore::seeded();
    let machines_before = test_store.get_all(MACHINES).unwrap();
    let users_before = test_store.get_all(USERS).unwrap();

    let document = json!({
        "clients": [
            { "id": 10, "name": "Bar Nuevo" },
            { "id": 11, "name": "Pub Viejo", "city": "Sevilla" }
        ],
        "notACollection": [1, 2, 3]
    });
    let report = test_store.import_document(document).unwrap();
    assert!(report.is_applied());
    assert_eq!(report.imported.get(CLIENTS), Some(&2));
    assert_eq!(report.skipped, vec!["notACollection".to_string()]);

    let clients: Vec<Client> = test_store.all_entities().unwrap();
    let names: Vec<&str> = clients.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Bar Nuevo", "Pub Viejo"]);
    assert_eq!(test_store.get_all(MACHINES).unwrap(), machines_before);
    assert_eq!(test_store.get_all(USERS).unwrap(), users_before);
}

#[test]
fn rejected_documents_write_nothing() {
    let test_store = TestStore::seeded();
    let before = test_store.export_json().unwrap();
    let log_before = test_store.log_size().unwrap();

    for text in ["[1, 2, 3]", "\"text\"", r#"{"unknown": []}"#, r#"{"clients": {}}"#] {
        let report = test_store.import_json(text).unwrap();
        assert!(
            matches!(report.rejected, Some(CoreError::ImportMalformed { .. })),
            "{text} should be rejected"
        );
        assert_eq!(report.total(), 0);
    }
    assert!(matches!(
        test_store.import_json("{not json"),
        Err(CoreError::Json(_))
    ));

    assert_eq!(test_store.export_json().unwrap(), before);
    assert_eq!(test_store.log_size().unwrap(), log_before);
}

#[test]
fn failed_import_rolls_back_every_collection() {
    let test_store = TestStore::seeded();
    let before = test_store.export_json().unwrap();

    // Duplicate serial numbers break the unique index on machines.
    let document = json!({
        "clients": [{ "id": 99, "name": "Otro" }],
        "machines": [
            serde_json::to_value(machine("X1", "DUP")).unwrap(),
            serde_json::to_value(machine("X2", "DUP")).unwrap()
        ]
    });
    let err = test_store.import_document(document).unwrap_err();
    assert!(matches!(err, CoreError::ConstraintViolation { .. }));
    assert_eq!(test_store.export_json().unwrap(), before);
}

#[test]
fn import_survives_reopen() {
    let source = TestStore::seeded();
    let text = source.export_json().unwrap();

    let target = TestStore::file();
    target.import_json(&text).unwrap();
    let target = target.reopen();
    assert_eq!(target.export_json().unwrap(), text);
    let admin: User = target.get_entity(&Key::from(DEFAULT_ADMIN_ID)).unwrap().unwrap();
    assert_eq!(admin.password, DEFAULT_PLACEHOLDER_CREDENTIAL);
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn every_imported_user_gets_a_password(
        names in prop::collection::btree_set(username_strategy(), 1..8),
        passwords in prop::collection::vec(password_strategy(), 8),
        known in prop::collection::vec(any::<bool>(), 8),
    ) {
        let test_store = TestStore::memory();
        let names: Vec<String> = names.into_iter().collect();
        let mut expected_preserved = BTreeSet::new();
        for (i, name) in names.iter().enumerate() {
            if known[i] {
                test_store.add_entity(&user(&format!("old-{i}"), name, &format!("kept-{i}"))).unwrap();
                expected_preserved.insert(name.clone());
            }
        }

        let users: Vec<Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut record = json!({ "id": format!("u-{i}"), "username": name, "name": name, "role": "technician" });
                if let Some(password) = &passwords[i] {
                    record["password"] = json!(password);
                }
                record
            })
            .collect();

        let report = test_store.import_document(json!({ "users": users })).unwrap();
        let stats = report.credentials;
        prop_assert_eq!(stats.from_document + stats.preserved + stats.placeholder, names.len());

        for (i, name) in names.iter().enumerate() {
            let stored: User = test_store.get_entity(&Key::from(format!("u-{i}"))).unwrap().unwrap();
            let expected = match &passwords[i] {
                Some(password) => password.clone(),
                None if expected_preserved.contains(name) => format!("kept-{i}"),
                None => DEFAULT_PLACEHOLDER_CREDENTIAL.to_string(),
            };
            prop_assert_eq!(stored.password, expected);
        }
    }
}
