//! # Rekreativ Core
//!
//! Persistence and reconciliation layer for the Rekreativ machine
//! management application.
//!
//! This crate provides:
//! - A versioned multi-collection record store, rebuilt from a
//!   write-ahead log on open
//! - Schema migrations applied as one atomic upgrade
//! - Multi-collection transactions with per-collection locking
//! - Counter reconciliation: a machine's aggregate counter and its
//!   history always change together
//! - JSON snapshot export/import that never loses stored passwords
//! - In-store backups, baseline seed data and a lazily opened shared handle
//!
//! ## Example
//!
//! ```rust,ignore
//! use rekreativ_core::{bootstrap, CounterUpdate, StoreConfig, StoreLocation};
//!
//! let store = bootstrap(&StoreLocation::path("data/rekreativ"), StoreConfig::default())?;
//! let entry = store.record_counter_update(CounterUpdate::new("M001", 1250, "manual"))?;
//! println!("{} moved by {}", entry.machine_id, entry.delta);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod collection;
mod config;
mod counter;
mod dir;
mod error;
mod index;
mod key;
pub mod migration;
pub mod model;
pub mod schema;
mod seed;
mod shared;
mod snapshot;
mod store;
mod transaction;
mod types;
pub mod wal;

pub use collection::CollectionState;
pub use config::{StoreConfig, DEFAULT_PLACEHOLDER_CREDENTIAL};
pub use counter::{
    apply_counter_update, counter_difference, revenue, CounterHistoryView, CounterUpdate,
    COUNTER_UPDATE_ACTION,
};
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult};
pub use index::SecondaryIndex;
pub use key::{resolve_path, Key};
pub use migration::{
    Migration, MigrationInfo, MigrationManager, MigrationOperation, MigrationRunResult,
    MigrationVersion, UpgradeContext,
};
pub use model::Entity;
pub use schema::{CollectionDef, IndexDef, CURRENT_VERSION};
pub use seed::{bootstrap, seed, SeedReport, DEFAULT_ADMIN_ID, DEFAULT_ADMIN_USERNAME};
pub use shared::{StoreCell, StoreLocation};
pub use snapshot::{CredentialStats, ImportReport};
pub use store::{CollectionSummary, Store};
pub use transaction::{PendingWrite, Transaction, TransactionManager, TransactionState};
pub use types::{SequenceNumber, TransactionId, TransactionMode};

pub use rekreativ_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageError};
