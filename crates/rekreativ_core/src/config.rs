//! Store configuration.

use crate::schema::CURRENT_VERSION;

/// Credential assigned to imported users when neither the document nor the
/// existing store knows their password.
pub const DEFAULT_PLACEHOLDER_CREDENTIAL: &str = "defaultPassword";

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the log on every commit (safer but slower).
    ///
    /// When false the log is still flushed to the OS before a commit is
    /// acknowledged.
    pub sync_on_commit: bool,

    /// Schema version the store is upgraded to on open.
    pub target_version: u32,

    /// Password given to imported users with no other credential source.
    pub placeholder_credential: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            target_version: CURRENT_VERSION,
            placeholder_credential: DEFAULT_PLACEHOLDER_CREDENTIAL.to_string(),
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the schema version to upgrade to on open.
    #[must_use]
    pub const fn target_version(mut self, version: u32) -> Self {
        self.target_version = version;
        self
    }

    /// Sets the placeholder credential used by snapshot import.
    #[must_use]
    pub fn placeholder_credential(mut self, value: impl Into<String>) -> Self {
        self.placeholder_credential = value.into();
        self
    }
}
