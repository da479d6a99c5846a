//! CLI command implementations.

pub mod backup;
pub mod counter;
pub mod init;
pub mod inspect;
pub mod snapshot;

use rekreativ_core::{CoreError, Store, StoreConfig};
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command needs `--path`.
    #[error("store path required for {command} (use --path)")]
    MissingPath {
        /// Command name.
        command: &'static str,
    },

    /// Store error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// File error.
    #[error("{path}: {source}")]
    File {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Output encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The import document was rejected.
    #[error("import rejected: {0}")]
    ImportRejected(CoreError),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Opens an existing store without seeding it.
pub fn open_existing(path: &Path) -> CliResult<Store> {
    Ok(Store::open_with_config(
        path,
        StoreConfig::default().create_if_missing(false),
    )?)
}

pub(crate) fn file_error(path: &Path, source: std::io::Error) -> CliError {
    CliError::File {
        path: path.display().to_string(),
        source,
    }
}
