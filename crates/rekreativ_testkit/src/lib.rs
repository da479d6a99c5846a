//! # Rekreativ Testkit
//!
//! Test utilities for the Rekreativ store.
//!
//! This crate provides:
//! - Store fixtures (in-memory, on-disk, seeded) and record builders
//! - Property-based test generators using proptest
//! - A crash-simulating log backend and recovery checks
//! - Concurrent stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rekreativ_testkit::prelude::*;
//!
//! #[test]
//! fn counter_moves_forward() {
//!     with_seeded_store(|store| {
//!         store.record_counter_update(CounterUpdate::new("M001", 10, "manual")).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use rekreativ_core::{CounterUpdate, Key, Store, StoreConfig, TransactionMode};
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
