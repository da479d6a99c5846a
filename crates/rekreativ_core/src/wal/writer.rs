//! Log writer.

use crate::error::CoreResult;
use crate::wal::{WalReader, WalRecord, WalReplay};
use parking_lot::Mutex;
use rekreativ_storage::StorageBackend;
use tracing::warn;

/// Owns the log backend.
///
/// Appends are serialized by an internal mutex, so commits touching
/// disjoint collections still land in the log one whole frame at a time.
pub struct WalManager {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl WalManager {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends one record and makes it durable before returning.
    ///
    /// Returns the offset the frame was written at. On failure the log is
    /// cut back to where the frame started, so a record the caller was told
    /// failed is not replayed later.
    pub fn append(&self, record: &WalRecord) -> CoreResult<u64> {
        let frame = record.encode_frame()?;
        let mut backend = self.backend.lock();
        let start = backend.size()?;
        let written = backend.append(&frame).and_then(|offset| {
            backend.flush()?;
            if self.sync_on_commit {
                backend.sync()?;
            }
            Ok(offset)
        });
        match written {
            Ok(offset) => Ok(offset),
            Err(err) => {
                if let Err(cut) = backend.truncate(start) {
                    warn!(offset = start, error = %cut, "could not cut back failed log append");
                }
                Err(err.into())
            }
        }
    }

    /// Flushes buffered bytes.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Current log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Feeds every complete record to `apply`, in log order.
    ///
    /// A torn tail is cut off so later appends start on a frame boundary.
    pub fn replay<F>(&self, mut apply: F) -> CoreResult<WalReplay>
    where
        F: FnMut(WalRecord) -> CoreResult<()>,
    {
        let mut backend = self.backend.lock();
        let mut summary = WalReplay::default();

        let (valid_end, torn_bytes) = {
            let mut reader = WalReader::new(&**backend)?;
            for item in &mut reader {
                let (_, record) = item?;
                apply(record)?;
                summary.records += 1;
            }
            (reader.valid_end(), reader.torn_bytes())
        };

        if torn_bytes > 0 {
            warn!(
                offset = valid_end,
                bytes = torn_bytes,
                "discarding torn record at end of log"
            );
            backend.truncate(valid_end)?;
            summary.torn_bytes = torn_bytes;
        }
        Ok(summary)
    }

    /// Copy of the raw log bytes.
    #[cfg(test)]
    pub(crate) fn raw_bytes(&self) -> CoreResult<Vec<u8>> {
        let backend = self.backend.lock();
        let size = backend.size()?;
        Ok(backend.read_at(0, size as usize)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SequenceNumber, TransactionId};
    use rekreativ_storage::InMemoryBackend;

    fn commit(txid: u64) -> WalRecord {
        WalRecord::Commit {
            txid: TransactionId::new(txid),
            sequence: SequenceNumber::new(txid),
            ops: Vec::new(),
        }
    }

    #[test]
    fn append_then_replay() {
        let wal = WalManager::new(Box::new(InMemoryBackend::new()), false);
        assert_eq!(wal.append(&commit(1)).unwrap(), 0);
        wal.append(&commit(2)).unwrap();

        let mut seen = Vec::new();
        let summary = wal
            .replay(|record| {
                seen.push(record);
                Ok(())
            })
            .unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.torn_bytes, 0);
        assert_eq!(seen, vec![commit(1), commit(2)]);
    }

    #[test]
    fn replay_cuts_the_torn_tail() {
        let mut bytes = commit(1).encode_frame().unwrap();
        let complete = bytes.len() as u64;
        bytes.extend_from_slice(&commit(2).encode_frame().unwrap()[..7]);
        let wal = WalManager::new(Box::new(InMemoryBackend::with_data(bytes)), false);

        let summary = wal.replay(|_| Ok(())).unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.torn_bytes, 7);
        assert_eq!(wal.size().unwrap(), complete);

        wal.append(&commit(3)).unwrap();
        let summary = wal.replay(|_| Ok(())).unwrap();
        assert_eq!(summary.records, 2);
    }
}
