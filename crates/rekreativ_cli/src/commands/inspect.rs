//! Inspect command implementation.

use super::{open_existing, CliResult};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Schema version.
    pub version: u32,
    /// Write-ahead log size in bytes.
    pub log_size: u64,
    /// Per-collection details.
    pub collections: Vec<CollectionInfo>,
}

/// Details of a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Primary key path.
    pub key_path: String,
    /// Number of records.
    pub records: usize,
    /// Index names, unique ones marked with `!`.
    pub indexes: Vec<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let store = open_existing(path)?;
    let result = InspectResult {
        path: path.display().to_string(),
        version: store.version(),
        log_size: store.log_size()?,
        collections: store
            .describe()?
            .into_iter()
            .map(|summary| CollectionInfo {
                name: summary.name,
                key_path: summary.key_path,
                records: summary.records,
                indexes: summary
                    .indexes
                    .iter()
                    .map(|index| {
                        if index.unique {
                            format!("{}!", index.name)
                        } else {
                            index.name.clone()
                        }
                    })
                    .collect(),
            })
            .collect(),
    };
    store.close()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Rekreativ Store Inspection");
    println!("==========================");
    println!();
    println!("Path:           {}", result.path);
    println!("Schema version: {}", result.version);
    println!("Log size:       {}", format_size(result.log_size));
    println!();
    println!("Collections:");
    for col in &result.collections {
        let indexes = if col.indexes.is_empty() {
            String::from("-")
        } else {
            col.indexes.join(", ")
        };
        println!(
            "  {:<16} {:>6} records  key={:<10} indexes: {}",
            col.name, col.records, col.key_path, indexes
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
