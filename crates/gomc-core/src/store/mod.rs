//! Entity stores.
//!
//! [`StateStore`] owns the on-disk layout and hands out one lightweight store
//! per entity kind. Stores hold no cached state: every call loads fresh from
//! disk and every mutation is a locked load-mutate-save cycle, so separate
//! go-mc processes never lose each other's updates.

mod backup;
mod global;
mod server;
mod settings;
mod whitelist;

pub use backup::BackupRegistryStore;
pub use global::GlobalStore;
pub use server::ServerStore;
pub use settings::ConfigStore;
pub use whitelist::WhitelistStore;

use crate::error::{Result, StateError};
use crate::platform::StateLayout;
use crate::process::PidLock;
use crate::storage::{read_document, with_lock, write_document};
use crate::validation::Validate;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Entry point to the persisted state under one configuration root.
#[derive(Debug, Clone)]
pub struct StateStore {
    layout: StateLayout,
}

impl StateStore {
    /// Open the store rooted at `root`, creating the directory tree.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = StateLayout::new(root);
        layout.ensure_dirs()?;
        info!("Opened state store at {}", layout.root().display());
        Ok(Self { layout })
    }

    /// Open the store at `$GO_MC_CONFIG_DIR` or `~/.go-mc`.
    pub fn from_env() -> Result<Self> {
        let layout = StateLayout::from_env()?;
        Self::open(layout.root())
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn global(&self) -> GlobalStore {
        GlobalStore::new(self.layout.clone())
    }

    pub fn servers(&self) -> ServerStore {
        ServerStore::new(self.layout.clone())
    }

    pub fn whitelists(&self) -> WhitelistStore {
        WhitelistStore::new(self.layout.clone())
    }

    pub fn config(&self) -> ConfigStore {
        ConfigStore::new(self.layout.clone())
    }

    pub fn backups(&self) -> BackupRegistryStore {
        BackupRegistryStore::new(self.layout.clone())
    }

    /// Take the process-wide singleton lock (`go-mc.pid`).
    pub fn acquire_pid_lock(&self) -> Result<PidLock> {
        PidLock::acquire(self.layout.pid_file())
    }
}

/// Read a singleton document, treating a quarantined file as absent.
fn read_singleton<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned + Validate,
{
    match read_document(path) {
        Err(StateError::Corrupted {
            quarantined_to,
            reason,
            ..
        }) => {
            warn!(
                "{} was unreadable ({}); moved to {} and starting from defaults",
                path.display(),
                reason,
                quarantined_to.display()
            );
            Ok(None)
        }
        other => other,
    }
}

/// Load a singleton document, writing defaults when none exists.
fn load_or_create<T>(layout: &StateLayout, path: &Path) -> Result<T>
where
    T: DeserializeOwned + Serialize + Validate + Default,
{
    if let Some(document) = read_singleton(path)? {
        return Ok(document);
    }
    with_lock(&layout.lock_file_for(path), || {
        // Another process may have created it while we waited.
        if let Some(document) = read_singleton(path)? {
            return Ok(document);
        }
        let document = T::default();
        write_document(path, &document)?;
        info!("Created {} with defaults", path.display());
        Ok(document)
    })
}

/// Locked load-mutate-save on a singleton document.
fn update_singleton<T, R>(
    layout: &StateLayout,
    path: &Path,
    mutate: impl FnOnce(&mut T) -> Result<R>,
) -> Result<R>
where
    T: DeserializeOwned + Serialize + Validate + Default,
{
    with_lock(&layout.lock_file_for(path), || {
        let mut document: T = read_singleton(path)?.unwrap_or_default();
        let result = mutate(&mut document)?;
        write_document(path, &document)?;
        Ok(result)
    })
}

/// Advance `updated_at` to now, never moving it backwards.
fn touch(updated_at: &mut DateTime<Utc>) {
    *updated_at = Utc::now().max(*updated_at);
}
