//! Init command implementation.

use super::CliResult;
use rekreativ_core::{seed, Store, StoreConfig};
use std::path::Path;
use tracing::info;

/// Creates (or opens) a store, upgrades it and fills in missing seed data.
pub fn run(path: &Path) -> CliResult<()> {
    info!("Initializing store at {:?}", path);
    let store = Store::open_with_config(path, StoreConfig::default())?;
    let report = seed(&store)?;

    println!("✓ Store ready at {}", path.display());
    println!("  Schema version: {}", store.version());
    if report.is_empty() {
        println!("  Seed data already present");
    } else {
        println!("  Seeded machines:        {}", report.machines);
        println!("  Seeded clients:         {}", report.clients);
        println!("  Seeded company profile: {}", yes_no(report.company_profile));
        println!("  Seeded admin user:      {}", yes_no(report.admin_user));
    }
    store.close()?;
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
