//! Backup catalogue: `backups/registry.yaml`.

use crate::error::{Result, StateError};
use crate::validation::{
    validate_backup_id, validate_filename, validate_path, validate_server_name, validate_version,
    Validate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Metadata for one backup archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub id: String,
    pub server: String,
    pub minecraft_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric_version: Option<String>,
    #[serde(default)]
    pub mods_count: u32,
    pub filename: String,
    pub file_path: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub compressed: bool,
    pub created_at: DateTime<Utc>,
}

impl BackupInfo {
    /// Newest first; equal timestamps fall back to id order.
    pub fn newest_first(a: &BackupInfo, b: &BackupInfo) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl Validate for BackupInfo {
    fn validate(&self) -> Result<()> {
        validate_backup_id(&self.id)?;
        validate_server_name(&self.server)?;
        validate_version(&self.minecraft_version)?;
        if let Some(fabric) = &self.fabric_version {
            validate_version(fabric)?;
        }
        validate_filename("backup filename", &self.filename)?;
        validate_path(&self.file_path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRegistry {
    #[serde(default)]
    pub backups: Vec<BackupInfo>,
}

impl BackupRegistry {
    pub fn get(&self, id: &str) -> Option<&BackupInfo> {
        self.backups.iter().find(|backup| backup.id == id)
    }
}

impl Validate for BackupRegistry {
    fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for backup in &self.backups {
            backup.validate()?;
            if !ids.insert(backup.id.as_str()) {
                return Err(StateError::validation(
                    "backups",
                    &backup.id,
                    "id appears more than once",
                ));
            }
        }
        Ok(())
    }
}
