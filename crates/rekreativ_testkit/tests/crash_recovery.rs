//! Reopening a store from every prefix of its log.

use rekreativ_core::schema::{COUNTER_HISTORY, MACHINES};
use rekreativ_core::CURRENT_VERSION;
use rekreativ_testkit::crash::{open_on, reopen_from, CrashableBackend};
use rekreativ_testkit::prelude::*;

/// Builds a log of a few commits. Returns the log and, per commit
/// boundary, `(log length, machines, history entries)`.
fn build_log() -> (Vec<u8>, Vec<(usize, usize, usize)>) {
    let (backend, control) = CrashableBackend::new();
    let store = open_on(backend).unwrap();
    let mut boundaries = vec![(control.len(), 0, 0)];

    store.add_entity(&machine("M001", "S1")).unwrap();
    boundaries.push((control.len(), 1, 0));
    store.add_entity(&machine_at("M002", "S2", 40)).unwrap();
    boundaries.push((control.len(), 2, 0));
    store
        .record_counter_update(CounterUpdate::new("M001", 15, "manual"))
        .unwrap();
    boundaries.push((control.len(), 2, 1));
    store
        .record_counter_update(CounterUpdate::new("M002", 10, "manual"))
        .unwrap();
    boundaries.push((control.len(), 2, 2));

    (control.bytes(), boundaries)
}

#[test]
fn every_prefix_reopens_to_the_last_whole_commit() {
    let (log, boundaries) = build_log();
    let first = boundaries[0].0;

    for len in first..=log.len() {
        let store = reopen_from(&log[..len])
            .unwrap_or_else(|err| panic!("prefix of {len} bytes failed to open: {err}"));
        assert_eq!(store.version(), CURRENT_VERSION);

        let (_, machines, history) = boundaries
            .iter()
            .rev()
            .find(|(end, _, _)| *end <= len)
            .copied()
            .unwrap();
        assert_eq!(store.count(MACHINES).unwrap(), machines, "prefix {len}");
        assert_eq!(store.count(COUNTER_HISTORY).unwrap(), history, "prefix {len}");
    }
}

#[test]
fn prefixes_inside_the_schema_setup_reopen_fresh() {
    let (log, boundaries) = build_log();
    for len in 0..boundaries[0].0 {
        let store = reopen_from(&log[..len]).unwrap();
        assert_eq!(store.version(), CURRENT_VERSION);
        assert_eq!(store.count(MACHINES).unwrap(), 0);
    }
}

#[test]
fn recovered_store_accepts_new_commits() {
    let (log, boundaries) = build_log();
    let cut = boundaries[3].0 + 5;
    let store = reopen_from(&log[..cut]).unwrap();
    assert_eq!(store.count(COUNTER_HISTORY).unwrap(), 1);

    store
        .record_counter_update(CounterUpdate::new("M002", 90, "manual"))
        .unwrap();
    let m: rekreativ_core::model::Machine = store.get_entity(&Key::from("M002")).unwrap().unwrap();
    assert_eq!(m.current_counter, 90);
    assert_eq!(store.count(COUNTER_HISTORY).unwrap(), 2);
}

#[test]
fn crash_mid_counter_update_loses_only_that_update() {
    let (backend, control) = CrashableBackend::new();
    let store = open_on(backend).unwrap();
    store.add_entity(&machine("M001", "S1")).unwrap();
    store
        .record_counter_update(CounterUpdate::new("M001", 10, "manual"))
        .unwrap();

    control.crash_after(control.len() + 20);
    assert!(store
        .record_counter_update(CounterUpdate::new("M001", 99, "manual"))
        .is_err());

    let recovered = reopen_from(&control.bytes()).unwrap();
    let m: rekreativ_core::model::Machine =
        recovered.get_entity(&Key::from("M001")).unwrap().unwrap();
    assert_eq!(m.current_counter, 10);
    assert_eq!(recovered.count(COUNTER_HISTORY).unwrap(), 1);
}
