//! Transaction coordinator.
//!
//! A transaction declares its collections and mode up front. Read-write
//! transactions hold exclusive locks on their collections, read-only ones
//! shared locks, so read-write transactions on the same collection run one
//! after the other while readers proceed together.

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::{PendingWrite, Transaction, TransactionState};
