//! Error types for the Rekreativ core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The store could not be opened, replayed or upgraded.
    #[error("failed to open store: {source}")]
    OpenFailed {
        /// What went wrong underneath.
        #[source]
        source: Box<CoreError>,
    },

    /// A unique secondary index already holds the value.
    #[error("constraint violation: index {index} on {collection} already contains {value}")]
    ConstraintViolation {
        /// Collection name.
        collection: String,
        /// Index name.
        index: String,
        /// Offending index value.
        value: String,
    },

    /// `add` found a record under the same primary key.
    #[error("duplicate key {key} in {collection}")]
    DuplicateKey {
        /// Collection name.
        collection: String,
        /// Offending key.
        key: String,
    },

    /// The counter update target does not exist.
    #[error("machine not found: {machine_id}")]
    MachineNotFound {
        /// Requested machine id.
        machine_id: String,
    },

    /// The transaction was rolled back.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// A snapshot document carried none of the known collections.
    #[error("import document is malformed: {reason}")]
    ImportMalformed {
        /// Why the document was rejected.
        reason: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] rekreativ_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value could not be encoded for the log.
    #[error("encode error: {message}")]
    Encode {
        /// Encoder message.
        message: String,
    },

    /// A record could not be decoded into its typed form.
    #[error("decode error: {message}")]
    Decode {
        /// Decoder message.
        message: String,
    },

    /// A record's key path is missing or not a valid key.
    #[error("invalid key in {collection}: {message}")]
    InvalidKey {
        /// Collection name.
        collection: String,
        /// Description.
        message: String,
    },

    /// Collection not found.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// Index not found.
    #[error("index {index} not found on {collection}")]
    IndexNotFound {
        /// Collection name.
        collection: String,
        /// Index name.
        index: String,
    },

    /// A transaction touched a collection it did not declare.
    #[error("collection {name} is not in the transaction scope")]
    NotInScope {
        /// Collection name.
        name: String,
    },

    /// No backup with the given id.
    #[error("backup not found: {id}")]
    BackupNotFound {
        /// Requested backup id.
        id: String,
    },

    /// The log is corrupted or invalid.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    DatabaseLocked,

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// Migration failed.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Wraps an error raised while opening a store.
    ///
    /// Already-wrapped errors are returned as is.
    pub fn open_failed(source: CoreError) -> Self {
        match source {
            Self::OpenFailed { .. } => source,
            other => Self::OpenFailed {
                source: Box::new(other),
            },
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint_violation(
        collection: impl Into<String>,
        index: impl Into<String>,
        value: impl std::fmt::Display,
    ) -> Self {
        Self::ConstraintViolation {
            collection: collection.into(),
            index: index.into(),
            value: value.to_string(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(collection: impl Into<String>, key: impl std::fmt::Display) -> Self {
        Self::DuplicateKey {
            collection: collection.into(),
            key: key.to_string(),
        }
    }

    /// Creates a machine not found error.
    pub fn machine_not_found(machine_id: impl Into<String>) -> Self {
        Self::MachineNotFound {
            machine_id: machine_id.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates an import malformed error.
    pub fn import_malformed(reason: impl Into<String>) -> Self {
        Self::ImportMalformed {
            reason: reason.into(),
        }
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidKey {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Creates a collection not found error.
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Creates an index not found error.
    pub fn index_not_found(collection: impl Into<String>, index: impl Into<String>) -> Self {
        Self::IndexNotFound {
            collection: collection.into(),
            index: index.into(),
        }
    }

    /// Creates a not-in-scope error.
    pub fn not_in_scope(name: impl Into<String>) -> Self {
        Self::NotInScope { name: name.into() }
    }

    /// Creates a backup not found error.
    pub fn backup_not_found(id: impl Into<String>) -> Self {
        Self::BackupNotFound { id: id.into() }
    }

    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a migration failed error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failed_does_not_nest() {
        let inner = CoreError::open_failed(CoreError::DatabaseLocked);
        let outer = CoreError::open_failed(inner);
        match outer {
            CoreError::OpenFailed { source } => {
                assert!(matches!(*source, CoreError::DatabaseLocked));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn messages_name_the_offender() {
        let err = CoreError::constraint_violation("users", "by-username", "\"admin\"");
        assert_eq!(
            err.to_string(),
            "constraint violation: index by-username on users already contains \"admin\""
        );
        assert_eq!(
            CoreError::machine_not_found("M404").to_string(),
            "machine not found: M404"
        );
    }
}
