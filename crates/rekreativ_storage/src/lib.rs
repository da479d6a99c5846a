//! # Rekreativ Storage
//!
//! Byte-level backends underneath the Rekreativ record store.
//!
//! A backend is an append-only byte sequence with random reads. It knows
//! nothing about records, collections or the log framing layered on top;
//! `rekreativ_core` owns every format decision.
//!
//! - [`InMemoryBackend`] keeps the bytes in a vector (tests, scratch stores)
//! - [`FileBackend`] keeps them in a single file on disk
//!
//! ```rust
//! use rekreativ_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
