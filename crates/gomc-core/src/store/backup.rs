//! Backup catalogue and retention.
//!
//! The registry only tracks metadata. Archive bytes are written by the
//! archiver; this store deletes them solely when retention evicts an entry.

use crate::error::{EntityKind, Result, StateError};
use crate::models::{BackupInfo, BackupRegistry};
use crate::platform::StateLayout;
use crate::storage::{read_document, with_lock, write_document};
use crate::validation::Validate;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BackupRegistryStore {
    layout: StateLayout,
}

impl BackupRegistryStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    fn path(&self) -> PathBuf {
        self.layout.registry_file()
    }

    /// Load the catalogue. An absent file is an empty registry.
    ///
    /// An unparsable catalogue is quarantined and reported; the next load
    /// then starts from an empty registry.
    pub fn load_registry(&self) -> Result<BackupRegistry> {
        Ok(read_document(&self.path())?.unwrap_or_default())
    }

    /// Catalogue a new backup. Fails if the id is already present.
    pub fn add_backup(&self, info: BackupInfo) -> Result<()> {
        info.validate()?;
        let id = info.id.clone();
        self.update(|registry| {
            if registry.get(&info.id).is_some() {
                return Err(StateError::already_exists(EntityKind::Backup, &info.id));
            }
            registry.backups.push(info);
            Ok(())
        })?;
        debug!(backup = %id, "Catalogued backup");
        Ok(())
    }

    /// Drop the catalogue entry for `id`. The archive file is left alone.
    pub fn remove_backup(&self, id: &str) -> Result<BackupInfo> {
        let removed = self.update(|registry| {
            let index = registry
                .backups
                .iter()
                .position(|backup| backup.id == id)
                .ok_or_else(|| StateError::not_found(EntityKind::Backup, id))?;
            Ok(registry.backups.remove(index))
        })?;
        debug!(backup = %id, "Removed backup from catalogue");
        Ok(removed)
    }

    pub fn get_backup(&self, id: &str) -> Result<BackupInfo> {
        self.load_registry()?
            .get(id)
            .cloned()
            .ok_or_else(|| StateError::not_found(EntityKind::Backup, id))
    }

    /// Backups of `server`, or of every server when `server` is empty,
    /// newest first.
    pub fn list_backups(&self, server: &str) -> Result<Vec<BackupInfo>> {
        let mut backups: Vec<BackupInfo> = self
            .load_registry()?
            .backups
            .into_iter()
            .filter(|backup| server.is_empty() || backup.server == server)
            .collect();
        backups.sort_by(BackupInfo::newest_first);
        Ok(backups)
    }

    /// Where the archive for `id` lives by convention.
    pub fn archive_path(&self, id: &str) -> Result<PathBuf> {
        self.layout.archive_file(id)
    }

    /// Keep the newest `keep_count` backups of each server and evict the rest.
    ///
    /// Evicted archives are deleted best-effort; a failed delete is logged and
    /// the entry is still dropped. Returns the evicted entries.
    pub fn enforce_retention_policy(&self, keep_count: u32) -> Result<Vec<BackupInfo>> {
        if keep_count == 0 {
            return Err(StateError::validation(
                "keep count",
                keep_count,
                "must be at least 1",
            ));
        }
        let keep = keep_count as usize;

        let evicted = self.update(|registry| {
            let mut by_server: BTreeMap<String, Vec<BackupInfo>> = BTreeMap::new();
            for backup in registry.backups.drain(..) {
                by_server
                    .entry(backup.server.clone())
                    .or_default()
                    .push(backup);
            }

            let mut evicted = Vec::new();
            for (_, mut group) in by_server {
                group.sort_by(BackupInfo::newest_first);
                if group.len() > keep {
                    evicted.extend(group.split_off(keep));
                }
                registry.backups.extend(group);
            }
            Ok(evicted)
        })?;

        for backup in &evicted {
            remove_archive(Path::new(&backup.file_path));
        }
        if !evicted.is_empty() {
            info!(
                evicted = evicted.len(),
                keep_count, "Enforced backup retention"
            );
        }
        Ok(evicted)
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut BackupRegistry) -> Result<R>) -> Result<R> {
        let path = self.path();
        with_lock(&self.layout.lock_file_for(&path), || {
            let mut registry: BackupRegistry = read_document(&path)?.unwrap_or_default();
            let result = mutate(&mut registry)?;
            write_document(&path, &registry)?;
            Ok(result)
        })
    }
}

fn remove_archive(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Deleted archive {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Archive {} was already gone", path.display())
        }
        Err(e) => warn!("Failed to delete archive {}: {}", path.display(), e),
    }
}
