//! Crash recovery testing.
//!
//! [`CrashableBackend`] is an in-memory log backend that can be told to
//! fail part-way through an append, leaving a torn frame behind, or to
//! fail on flush. Its bytes stay reachable through the shared
//! [`CrashControl`], so a test can reopen a fresh store over exactly what
//! a crashed process would have left on disk.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rekreativ_testkit::crash::{CrashableBackend, reopen_from};
//!
//! let (backend, control) = CrashableBackend::new();
//! let store = open_on(backend)?;
//! control.crash_after(control.len() + 8);
//! assert!(store.add(MACHINES, record).is_err());
//! let recovered = reopen_from(&control.bytes())?;
//! ```

use parking_lot::Mutex;
use rekreativ_core::schema::app_migrations;
use rekreativ_core::{CoreResult, InMemoryBackend, Store, StoreConfig};
use rekreativ_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared switches and contents of a [`CrashableBackend`].
#[derive(Debug)]
pub struct CrashControl {
    bytes: Mutex<Vec<u8>>,
    crash_after_bytes: AtomicUsize,
    crashed: AtomicBool,
    fail_on_flush: AtomicBool,
}

impl CrashControl {
    /// Crashes once the log would grow past `bytes` bytes. The append that
    /// crosses the limit writes only the part below it.
    pub fn crash_after(&self, bytes: usize) {
        self.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Sets whether flush and sync should fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Clears every switch. The written bytes are kept.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_flush.store(false, Ordering::SeqCst);
    }

    /// Returns whether a simulated crash has happened.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Current log length.
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the log as a crashed process would leave it.
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    fn crash(&self, what: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated crash during {what}"),
        ))
    }
}

/// A log backend that can simulate crashes.
pub struct CrashableBackend {
    control: Arc<CrashControl>,
}

impl CrashableBackend {
    /// Creates an empty backend and its control handle.
    pub fn new() -> (Self, Arc<CrashControl>) {
        let control = Arc::new(CrashControl {
            bytes: Mutex::new(Vec::new()),
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            crashed: AtomicBool::new(false),
            fail_on_flush: AtomicBool::new(false),
        });
        (
            Self {
                control: Arc::clone(&control),
            },
            control,
        )
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let bytes = self.control.bytes.lock();
        let size = bytes.len() as u64;
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= size => Ok(bytes[offset as usize..end as usize].to_vec()),
            _ => Err(StorageError::ReadPastEnd { offset, len, size }),
        }
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut bytes = self.control.bytes.lock();
        let current = bytes.len();
        let threshold = self.control.crash_after_bytes.load(Ordering::SeqCst);

        if current >= threshold {
            return Err(self.control.crash("write"));
        }
        if current + data.len() > threshold {
            bytes.extend_from_slice(&data[..threshold - current]);
            return Err(self.control.crash("partial write"));
        }

        bytes.extend_from_slice(data);
        Ok(current as u64)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.control.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.control.crash("flush"));
        }
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.control.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.control.crash("sync"));
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.control.bytes.lock().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.control.bytes.lock();
        let size = bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        bytes.truncate(new_size as usize);
        Ok(())
    }
}

/// Opens a store with the application schema over `backend`.
pub fn open_on(backend: impl StorageBackend + 'static) -> CoreResult<Store> {
    Store::open_with_backend(
        Box::new(backend),
        StoreConfig::default(),
        &app_migrations()?,
    )
}

/// Opens a fresh store over a copy of `log`, as a restarted process would.
pub fn reopen_from(log: &[u8]) -> CoreResult<Store> {
    open_on(InMemoryBackend::with_data(log.to_vec()))
}
