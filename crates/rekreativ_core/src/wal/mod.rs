//! Write-ahead log.
//!
//! Every committed read-write transaction and every schema upgrade is one
//! framed record:
//!
//! ```text
//! | magic "RKWL" (4) | version (2) | type (1) | length (4) | CBOR payload (N) | crc32 (4) |
//! ```
//!
//! The log is the store's only persistent form; opening a store replays it
//! from the start.
//!
//! ## Recovery policy
//!
//! Tolerated (clean end of log, the tail is cut off):
//!
//! - fewer header bytes than a full header
//! - a length that runs past the end of the file
//!
//! Both are crashes mid-append. Whatever the torn record carried was never
//! acknowledged.
//!
//! Fatal (the store refuses to open):
//!
//! - CRC mismatch
//! - bad magic, unknown record type, or a version newer than this build
//! - a payload that does not decode
//!
//! ## Invariants
//!
//! - records are appended and flushed before in-memory state changes
//! - aborted transactions never reach the log
//! - replay is deterministic: the same log yields the same state

mod reader;
mod record;
mod writer;

pub use reader::{WalReader, WalReplay};
pub use record::{compute_crc32, IndexAddition, WalOp, WalRecord, WalRecordType};
pub use writer::WalManager;

pub(crate) use record::{CRC_SIZE, HEADER_SIZE, WAL_MAGIC, WAL_VERSION};
