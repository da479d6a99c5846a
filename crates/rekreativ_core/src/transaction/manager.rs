//! Transaction manager.

use crate::error::{CoreError, CoreResult};
use crate::transaction::state::Transaction;
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::{WalManager, WalRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Hands out transaction ids and commits transactions through the log.
///
/// ## Commit protocol
///
/// 1. A transaction with no staged writes commits without touching the log.
/// 2. Otherwise its operations become one `Commit` record, appended and
///    flushed.
/// 3. Only then are they applied to the locked collections.
///
/// If the append fails the transaction is aborted and nothing is applied.
#[derive(Debug)]
pub struct TransactionManager {
    next_txid: AtomicU64,
    next_seq: AtomicU64,
}

impl TransactionManager {
    /// Creates a manager for an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(1, 1)
    }

    /// Creates a manager resuming after a replayed log.
    #[must_use]
    pub fn with_state(next_txid: u64, next_seq: u64) -> Self {
        Self {
            next_txid: AtomicU64::new(next_txid),
            next_seq: AtomicU64::new(next_seq),
        }
    }

    /// Allocates a transaction id.
    pub fn next_id(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    /// Sequence number the next commit will receive.
    #[must_use]
    pub fn next_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.next_seq.load(Ordering::SeqCst))
    }

    /// Commits `txn`.
    ///
    /// Returns the commit's sequence number, or `None` when there was
    /// nothing to write.
    pub fn commit(
        &self,
        wal: &WalManager,
        txn: &mut Transaction<'_>,
    ) -> CoreResult<Option<SequenceNumber>> {
        txn.ensure_active()?;

        let ops = txn.take_log();
        if ops.is_empty() {
            txn.mark_committed();
            debug!(txid = %txn.id(), "transaction committed without writes");
            return Ok(None);
        }

        let sequence = SequenceNumber::new(self.next_seq.fetch_add(1, Ordering::SeqCst));
        let record = WalRecord::Commit {
            txid: txn.id(),
            sequence,
            ops,
        };
        if let Err(err) = wal.append(&record) {
            txn.abort();
            return Err(CoreError::transaction_aborted(format!(
                "log append failed for {}: {err}",
                txn.id()
            )));
        }

        if let WalRecord::Commit { ops, .. } = record {
            debug!(txid = %txn.id(), %sequence, ops = ops.len(), "transaction committed");
            txn.apply(ops);
        }
        Ok(Some(sequence))
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase() {
        let manager = TransactionManager::with_state(7, 3);
        assert_eq!(manager.next_id(), TransactionId::new(7));
        assert_eq!(manager.next_id(), TransactionId::new(8));
        assert_eq!(manager.next_sequence(), SequenceNumber::new(3));
    }
}
