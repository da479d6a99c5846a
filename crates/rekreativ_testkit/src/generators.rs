//! Property-based test generators.
//!
//! Provides proptest strategies for counter readings, history entries and
//! snapshot users.

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use rekreativ_core::model::CounterHistoryEntry;
use serde_json::Map;

/// Strategy for machine ids (`M000` to `M009`).
pub fn machine_id_strategy() -> impl Strategy<Value = String> {
    (0u8..10).prop_map(|n| format!("M{n:03}"))
}

/// Strategy for a single counter reading.
pub fn counter_value_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        3 => 0u64..10_000,
        1 => 0u64..=u64::from(u32::MAX),
    ]
}

/// Strategy for a sequence of readings for one machine.
pub fn counter_readings_strategy(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(counter_value_strategy(), 1..=max_len)
}

/// Strategy for a source tag.
pub fn source_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["manual", "collection", "auto", "import"]).prop_map(String::from)
}

/// Strategy for a history timestamp drawn from a small pool, so separate
/// batches overlap often.
pub fn pooled_timestamp_strategy(pool: u32) -> impl Strategy<Value = String> {
    (0..pool).prop_map(|n| {
        format!(
            "2024-03-{:02}T{:02}:{:02}:00.000000Z",
            1 + n / 1440,
            (n / 60) % 24,
            n % 60
        )
    })
}

/// Strategy for one history entry with a pooled timestamp.
pub fn history_entry_strategy(pool: u32) -> impl Strategy<Value = CounterHistoryEntry> {
    (
        pooled_timestamp_strategy(pool),
        machine_id_strategy(),
        counter_value_strategy(),
        source_strategy(),
    )
        .prop_map(|(timestamp, machine_id, value, source)| CounterHistoryEntry {
            timestamp,
            machine_id,
            value,
            previous_value: 0,
            delta: value,
            clamped: false,
            source,
            notes: None,
            extra: Map::new(),
        })
}

/// Strategy for a batch of history entries with unique timestamps, as one
/// fetch from the store would return.
pub fn history_batch_strategy(
    pool: u32,
    max_len: usize,
) -> impl Strategy<Value = Vec<CounterHistoryEntry>> {
    prop::collection::vec(history_entry_strategy(pool), 0..=max_len).prop_map(|mut entries| {
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        entries.dedup_by(|a, b| a.timestamp == b.timestamp);
        entries
    })
}

/// Strategy for usernames.
pub fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{2,11}").expect("Invalid regex")
}

/// Strategy for an optional password (`None` models a stripped export).
pub fn password_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::string::string_regex("[A-Za-z0-9]{4,16}").expect("Invalid regex"))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
