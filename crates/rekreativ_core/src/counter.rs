//! Counter reconciliation.
//!
//! A machine's `currentCounter` only moves forward. Every reported reading
//! produces exactly one immutable [`CounterHistoryEntry`], written in the
//! same transaction as the machine, so the aggregate and its history can
//! never disagree.
//!
//! On the read side, [`CounterHistoryView`] merges entries fetched by
//! different queries into one de-duplicated, newest-first list.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::model::{CounterHistoryEntry, HistoryEvent, Machine};
use crate::schema::{BY_MACHINE_ID, COUNTER_HISTORY, MACHINES};
use crate::store::Store;
use crate::transaction::Transaction;
use crate::types::TransactionMode;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Map;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::info;

/// History action tag for counter updates.
pub const COUNTER_UPDATE_ACTION: &str = "counter_update";

/// A reported counter reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterUpdate {
    /// Target machine.
    pub machine_id: String,
    /// Value read off the machine.
    pub new_value: u64,
    /// Where the reading came from.
    pub source: String,
    /// Free text.
    pub notes: Option<String>,
}

impl CounterUpdate {
    /// A reading without notes.
    pub fn new(machine_id: impl Into<String>, new_value: u64, source: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            new_value,
            source: source.into(),
            notes: None,
        }
    }

    /// Attaches notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// `max(0, current - previous)`.
#[must_use]
pub fn counter_difference(previous: u64, current: u64) -> u64 {
    current.saturating_sub(previous)
}

/// Operator revenue for a counter difference at `split_percentage`.
#[must_use]
pub fn revenue(difference: u64, split_percentage: f64) -> f64 {
    difference as f64 * split_percentage / 100.0
}

/// Records a reading inside an existing transaction.
///
/// The transaction must be read-write over `machines` and `counterHistory`.
/// Callers composing larger transactions use this directly; everyone else
/// calls [`Store::record_counter_update`].
pub fn apply_counter_update(
    tx: &mut Transaction<'_>,
    update: &CounterUpdate,
) -> CoreResult<CounterHistoryEntry> {
    let mut machine: Machine = tx
        .get_entity(&Key::from(update.machine_id.as_str()))?
        .ok_or_else(|| CoreError::machine_not_found(&update.machine_id))?;

    let previous = machine.current_counter;
    let aggregate = previous
        .max(update.new_value)
        .max(machine.initial_counter);
    let delta = aggregate - previous;
    let clamped = update.new_value < previous;

    let timestamp = next_timestamp(tx, Utc::now())?;
    let entry = CounterHistoryEntry {
        timestamp: timestamp.clone(),
        machine_id: update.machine_id.clone(),
        value: update.new_value,
        previous_value: previous,
        delta,
        clamped,
        source: update.source.clone(),
        notes: update.notes.clone(),
        extra: Map::new(),
    };

    machine.current_counter = aggregate;
    machine.updated_at = timestamp.clone();
    machine.history.push(HistoryEvent {
        date: timestamp,
        action: COUNTER_UPDATE_ACTION.to_string(),
        details: describe(update, previous, aggregate),
    });

    tx.add_entity(&entry)?;
    tx.put_entity(&machine)?;
    Ok(entry)
}

fn describe(update: &CounterUpdate, previous: u64, aggregate: u64) -> String {
    let mut details = if update.new_value < previous {
        format!(
            "Counter report {} below stored {previous}, kept {aggregate} via {}",
            update.new_value, update.source
        )
    } else {
        format!(
            "Counter updated to {aggregate} (+{}) via {}",
            aggregate - previous,
            update.source
        )
    };
    if let Some(notes) = &update.notes {
        details.push_str(": ");
        details.push_str(notes);
    }
    details
}

/// Issues a history key strictly after every key already in the
/// collection, at microsecond resolution.
fn next_timestamp(tx: &Transaction<'_>, now: DateTime<Utc>) -> CoreResult<String> {
    let now = DateTime::<Utc>::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now);
    let latest = tx
        .last_key(COUNTER_HISTORY)?
        .as_ref()
        .and_then(Key::as_text)
        .and_then(parse_timestamp);

    let mut candidate = match latest {
        Some(latest) if latest >= now => latest + Duration::microseconds(1),
        _ => now,
    };
    loop {
        let key = format_timestamp(candidate);
        if tx.get(COUNTER_HISTORY, &Key::from(key.as_str()))?.is_none() {
            return Ok(key);
        }
        candidate += Duration::microseconds(1);
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Newest first. Parsable timestamps order by instant and come before
/// unparsable ones; text breaks ties.
fn newest_first(a: &CounterHistoryEntry, b: &CounterHistoryEntry) -> Ordering {
    sort_key(b).cmp(&sort_key(a))
}

fn sort_key(entry: &CounterHistoryEntry) -> (Option<DateTime<Utc>>, &str) {
    (parse_timestamp(&entry.timestamp), entry.timestamp.as_str())
}

impl Store {
    /// Records a counter reading for a machine.
    ///
    /// The machine and the new history entry are written in one
    /// transaction. The aggregate becomes
    /// `max(current, reported, initial)`; a report below the aggregate is
    /// kept in history with `clamped` set.
    ///
    /// # Errors
    ///
    /// `MachineNotFound` if the machine does not exist. Nothing is written
    /// on any error.
    pub fn record_counter_update(&self, update: CounterUpdate) -> CoreResult<CounterHistoryEntry> {
        let entry = self.with_transaction(
            &[MACHINES, COUNTER_HISTORY],
            TransactionMode::ReadWrite,
            |tx| apply_counter_update(tx, &update),
        )?;
        info!(
            machine = %entry.machine_id,
            value = entry.value,
            delta = entry.delta,
            clamped = entry.clamped,
            timestamp = %entry.timestamp,
            "counter update recorded"
        );
        Ok(entry)
    }

    /// Every history entry, oldest first.
    pub fn fetch_all_counter_history(&self) -> CoreResult<Vec<CounterHistoryEntry>> {
        self.all_entities()
    }

    /// History entries of one machine, oldest first.
    pub fn fetch_counter_history_by_machine(
        &self,
        machine_id: &str,
    ) -> CoreResult<Vec<CounterHistoryEntry>> {
        let value = Key::from(machine_id);
        self.with_transaction(&[COUNTER_HISTORY], TransactionMode::ReadOnly, |tx| {
            tx.entities_by_index(BY_MACHINE_ID, &value)
        })
    }
}

/// Client-side cache of counter history.
///
/// Immutable: every operation returns a new view. Entries are unique by
/// timestamp and sorted newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterHistoryView {
    entries: Vec<CounterHistoryEntry>,
}

impl CounterHistoryView {
    /// An empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A view holding `entries`, de-duplicated and sorted.
    pub fn from_entries(entries: impl IntoIterator<Item = CounterHistoryEntry>) -> Self {
        Self::new().merged(entries)
    }

    /// Replaces the whole cache, as after fetching everything.
    #[must_use]
    pub fn replaced(&self, entries: impl IntoIterator<Item = CounterHistoryEntry>) -> Self {
        Self::from_entries(entries)
    }

    /// Adds entries whose timestamp is not cached yet. Cached entries win.
    #[must_use]
    pub fn merged(&self, incoming: impl IntoIterator<Item = CounterHistoryEntry>) -> Self {
        let mut seen: BTreeSet<String> = self
            .entries
            .iter()
            .map(|entry| entry.timestamp.clone())
            .collect();
        let mut entries = self.entries.clone();
        entries.extend(incoming.into_iter().filter(|entry| seen.insert(entry.timestamp.clone())));
        entries.sort_by(newest_first);
        Self { entries }
    }

    /// Adds a freshly recorded entry.
    #[must_use]
    pub fn with_recorded(&self, entry: CounterHistoryEntry) -> Self {
        self.merged([entry])
    }

    /// Entries of one machine.
    #[must_use]
    pub fn for_machine(&self, machine_id: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| entry.machine_id == machine_id)
                .cloned()
                .collect(),
        }
    }

    /// Most recent entry of one machine.
    #[must_use]
    pub fn latest_for(&self, machine_id: &str) -> Option<&CounterHistoryEntry> {
        self.entries.iter().find(|entry| entry.machine_id == machine_id)
    }

    /// Entries, newest first.
    #[must_use]
    pub fn entries(&self) -> &[CounterHistoryEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
