//! Counter update and history commands.

use super::{open_existing, CliResult};
use rekreativ_core::{CounterHistoryView, CounterUpdate};
use std::path::Path;

/// Records one counter reading.
pub fn record(
    path: &Path,
    machine: &str,
    value: u64,
    source: &str,
    notes: Option<&str>,
) -> CliResult<()> {
    let store = open_existing(path)?;
    let mut update = CounterUpdate::new(machine, value, source);
    if let Some(notes) = notes {
        update = update.with_notes(notes);
    }
    let entry = store.record_counter_update(update)?;
    store.close()?;

    if entry.clamped {
        println!(
            "✓ Recorded {} for {} (below stored {}, counter unchanged)",
            entry.value, entry.machine_id, entry.previous_value
        );
    } else {
        println!(
            "✓ Recorded {} for {} (+{})",
            entry.value, entry.machine_id, entry.delta
        );
    }
    println!("  Timestamp: {}", entry.timestamp);
    Ok(())
}

/// Prints counter history, newest first.
pub fn history(path: &Path, machine: Option<&str>, format: &str) -> CliResult<()> {
    let store = open_existing(path)?;
    let entries = match machine {
        Some(machine) => store.fetch_counter_history_by_machine(machine)?,
        None => store.fetch_all_counter_history()?,
    };
    store.close()?;

    let view = CounterHistoryView::from_entries(entries);
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(view.entries())?);
        return Ok(());
    }
    if view.is_empty() {
        println!("No counter history");
        return Ok(());
    }
    for entry in view.entries() {
        let flag = if entry.clamped { " (clamped)" } else { "" };
        println!(
            "{}  {:<6} {:>10} {:>+8}{}  [{}]{}",
            entry.timestamp,
            entry.machine_id,
            entry.value,
            entry.delta,
            flag,
            entry.source,
            entry
                .notes
                .as_deref()
                .map(|notes| format!(" {notes}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
