//! A process-wide store handle.
//!
//! [`StoreCell`] opens, upgrades and seeds its store on first use and hands
//! out the same `Arc<Store>` afterwards. Callers racing on the first use
//! block until the single initialization finishes.
//!
//! ```ignore
//! static STORE: Lazy<StoreCell> =
//!     Lazy::new(|| StoreCell::new(StoreLocation::path("data/rekreativ"), StoreConfig::default()));
//!
//! let store = STORE.get()?;
//! ```

use crate::config::StoreConfig;
use crate::error::CoreResult;
use crate::seed::bootstrap;
use crate::store::Store;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A directory on disk.
    Path(PathBuf),
    /// Memory only; contents are lost on drop.
    InMemory,
}

impl StoreLocation {
    /// A directory location.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

/// Lazily bootstrapped shared store.
#[derive(Debug)]
pub struct StoreCell {
    location: StoreLocation,
    config: StoreConfig,
    store: OnceCell<Arc<Store>>,
}

impl StoreCell {
    /// A cell that bootstraps `location` with `config` on first use.
    #[must_use]
    pub fn new(location: StoreLocation, config: StoreConfig) -> Self {
        Self {
            location,
            config,
            store: OnceCell::new(),
        }
    }

    /// Returns the shared store, bootstrapping it if needed.
    ///
    /// A failed bootstrap is returned to the caller that ran it and leaves
    /// the cell empty, so a later call tries again.
    pub fn get(&self) -> CoreResult<Arc<Store>> {
        self.store
            .get_or_try_init(|| {
                debug!(location = ?self.location, "bootstrapping shared store");
                bootstrap(&self.location, self.config.clone()).map(Arc::new)
            })
            .cloned()
    }

    /// The store, if already initialized.
    #[must_use]
    pub fn get_if_ready(&self) -> Option<Arc<Store>> {
        self.store.get().cloned()
    }

    /// Where the store lives.
    #[must_use]
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::schema::USERS;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn concurrent_callers_share_one_store() {
        let temp = tempdir().unwrap();
        let cell = Arc::new(StoreCell::new(
            StoreLocation::path(temp.path().join("store")),
            StoreConfig::default(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || cell.get().unwrap())
            })
            .collect();
        let stores: Vec<Arc<Store>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for store in &stores[1..] {
            assert!(Arc::ptr_eq(&stores[0], store));
        }
        assert_eq!(stores[0].count(USERS).unwrap(), 1);
    }

    #[test]
    fn failed_bootstrap_leaves_cell_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("absent");
        let cell = StoreCell::new(
            StoreLocation::path(&path),
            StoreConfig::default().create_if_missing(false),
        );

        assert!(matches!(cell.get(), Err(CoreError::OpenFailed { .. })));
        assert!(cell.get_if_ready().is_none());

        std::fs::create_dir_all(&path).unwrap();
        assert!(cell.get().is_ok());
        assert!(cell.get_if_ready().is_some());
    }

    #[test]
    fn in_memory_location() {
        let cell = StoreCell::new(StoreLocation::InMemory, StoreConfig::default());
        let first = cell.get().unwrap();
        let second = cell.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cell.location(), &StoreLocation::InMemory);
    }
}
