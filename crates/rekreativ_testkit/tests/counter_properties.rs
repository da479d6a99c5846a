//! Counter reconciliation properties.

use proptest::prelude::*;
use rekreativ_core::model::Machine;
use rekreativ_core::schema::{COUNTER_HISTORY, MACHINES};
use rekreativ_core::{CoreError, CounterHistoryView, CounterUpdate, Key};
use rekreativ_testkit::prelude::*;
use std::collections::BTreeSet;

fn current_counter(store: &Store, id: &str) -> u64 {
    let machine: Machine = store.get_entity(&Key::from(id)).unwrap().unwrap();
    machine.current_counter
}

#[test]
fn example_scenario() {
    let test_store = TestStore::memory();
    test_store.add_entity(&machine("M001", "PIN001")).unwrap();

    let first = test_store
        .record_counter_update(CounterUpdate::new("M001", 120, "manual"))
        .unwrap();
    assert_eq!(first.value, 120);
    assert_eq!(current_counter(&test_store, "M001"), 120);

    let second = test_store
        .record_counter_update(CounterUpdate::new("M001", 90, "manual"))
        .unwrap();
    assert_eq!(second.value, 90);
    assert_ne!(first.timestamp, second.timestamp);
    assert_eq!(current_counter(&test_store, "M001"), 120);
}

#[test]
fn missing_machine_changes_nothing() {
    with_seeded_store(|store| {
        store
            .record_counter_update(CounterUpdate::new("M001", 5, "manual"))
            .unwrap();
        let machines = store.get_all(MACHINES).unwrap();
        let history = store.get_all(COUNTER_HISTORY).unwrap();
        let exported = store.export_json().unwrap();

        let err = store
            .record_counter_update(CounterUpdate::new("NOPE", 50, "manual"))
            .unwrap_err();
        assert!(matches!(err, CoreError::MachineNotFound { .. }));

        assert_eq!(store.get_all(MACHINES).unwrap(), machines);
        assert_eq!(store.get_all(COUNTER_HISTORY).unwrap(), history);
        assert_eq!(store.export_json().unwrap(), exported);
    });
}

#[test]
fn history_survives_reopen_in_order() {
    let test_store = TestStore::file();
    test_store.add_entity(&machine("M001", "PIN001")).unwrap();
    for value in [10, 5, 30] {
        test_store
            .record_counter_update(CounterUpdate::new("M001", value, "manual"))
            .unwrap();
    }
    let test_store = test_store.reopen();

    let history = test_store.fetch_counter_history_by_machine("M001").unwrap();
    let values: Vec<u64> = history.iter().map(|e| e.value).collect();
    assert_eq!(values, vec![10, 5, 30]);
    assert_eq!(current_counter(&test_store, "M001"), 30);
    assert!(history[1].clamped);
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn aggregate_is_max_of_readings_and_initial(
        initial in 0u64..5_000,
        readings in counter_readings_strategy(12),
    ) {
        let test_store = TestStore::memory();
        test_store.add_entity(&machine_at("M001", "PIN001", initial)).unwrap();

        let mut previous = initial;
        for &value in &readings {
            let entry = test_store
                .record_counter_update(CounterUpdate::new("M001", value, "manual"))
                .unwrap();
            let now = current_counter(&test_store, "M001");
            prop_assert!(now >= previous);
            prop_assert_eq!(entry.delta, now - previous);
            prop_assert_eq!(entry.clamped, value < previous);
            previous = now;
        }

        let expected = readings.iter().copied().max().unwrap_or(0).max(initial);
        prop_assert_eq!(current_counter(&test_store, "M001"), expected);

        let history = test_store.fetch_counter_history_by_machine("M001").unwrap();
        prop_assert_eq!(history.len(), readings.len());
        let stamps: BTreeSet<_> = history.iter().map(|e| e.timestamp.clone()).collect();
        prop_assert_eq!(stamps.len(), readings.len());
    }

    #[test]
    fn readings_on_other_machines_do_not_interfere(
        a in counter_readings_strategy(6),
        b in counter_readings_strategy(6),
    ) {
        let test_store = TestStore::memory();
        test_store.add_entity(&machine("M001", "PIN001")).unwrap();
        test_store.add_entity(&machine("M002", "PIN002")).unwrap();

        for (x, y) in a.iter().zip(b.iter().chain(std::iter::repeat(&0))) {
            test_store.record_counter_update(CounterUpdate::new("M001", *x, "manual")).unwrap();
            test_store.record_counter_update(CounterUpdate::new("M002", *y, "manual")).unwrap();
        }
        let expected_b = b.iter().take(a.len()).copied().max().unwrap_or(0);
        prop_assert_eq!(current_counter(&test_store, "M001"), a.iter().copied().max().unwrap_or(0));
        prop_assert_eq!(current_counter(&test_store, "M002"), expected_b);
        prop_assert_eq!(test_store.count(COUNTER_HISTORY).unwrap(), 2 * a.len());
    }

    #[test]
    fn merge_cardinality_and_order(
        a in history_batch_strategy(40, 25),
        b in history_batch_strategy(40, 25),
    ) {
        let a_stamps: BTreeSet<_> = a.iter().map(|e| e.timestamp.clone()).collect();
        let overlap = b.iter().filter(|e| a_stamps.contains(&e.timestamp)).count();

        let view = CounterHistoryView::new().replaced(a.clone()).merged(b.clone());
        prop_assert_eq!(view.len(), a.len() + b.len() - overlap);

        for pair in view.entries().windows(2) {
            prop_assert!(pair[0].timestamp > pair[1].timestamp);
        }
        for entry in view.entries() {
            if a_stamps.contains(&entry.timestamp) {
                let original = a.iter().find(|e| e.timestamp == entry.timestamp).unwrap();
                prop_assert_eq!(entry, original);
            }
        }

        let again = view.merged(b);
        prop_assert_eq!(again, view);
    }

    #[test]
    fn difference_never_negative(previous in counter_value_strategy(), current in counter_value_strategy()) {
        let diff = rekreativ_core::counter_difference(previous, current);
        prop_assert_eq!(diff, current.saturating_sub(previous));
        prop_assert!(rekreativ_core::revenue(diff, 50.0) >= 0.0);
    }
}
