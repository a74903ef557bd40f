//! Configuration root resolution and on-disk layout.
//!
//! ```text
//! <config>/config.yaml
//! <config>/state.yaml
//! <config>/servers/<name>.yaml
//! <config>/whitelists/<name>.yaml
//! <config>/backups/registry.yaml
//! <config>/backups/archives/<id>.tar.gz
//! <config>/go-mc.pid
//! <config>/locks/<file>.lock
//! ```

use crate::config::PathsConfig;
use crate::error::{Result, StateError};
use crate::validation::{validate_backup_id, validate_server_name, validate_whitelist_name};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve the go-mc configuration root.
///
/// `$GO_MC_CONFIG_DIR` wins when set and non-empty; otherwise
/// `~/.go-mc`.
pub fn resolve_config_dir() -> Result<PathBuf> {
    resolve_config_dir_from(std::env::var_os(PathsConfig::CONFIG_DIR_ENV))
}

fn resolve_config_dir_from(env_value: Option<OsString>) -> Result<PathBuf> {
    if let Some(dir) = env_value.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or_else(|| StateError::Config {
        message: format!(
            "Could not determine home directory; set {}",
            PathsConfig::CONFIG_DIR_ENV
        ),
    })?;
    Ok(home.join(PathsConfig::APP_DIR_NAME))
}

/// Every path the store reads or writes, derived from one root.
///
/// Name-keyed accessors validate the name first, so a key can never escape
/// its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at [`resolve_config_dir`].
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(resolve_config_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(PathsConfig::CONFIG_FILENAME)
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(PathsConfig::STATE_FILENAME)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join(PathsConfig::PID_FILENAME)
    }

    pub fn servers_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::SERVERS_DIR_NAME)
    }

    pub fn server_file(&self, name: &str) -> Result<PathBuf> {
        validate_server_name(name)?;
        Ok(self.servers_dir().join(document_name(name)))
    }

    pub fn whitelists_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::WHITELISTS_DIR_NAME)
    }

    pub fn whitelist_file(&self, name: &str) -> Result<PathBuf> {
        validate_whitelist_name(name)?;
        Ok(self.whitelists_dir().join(document_name(name)))
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::BACKUPS_DIR_NAME)
    }

    pub fn registry_file(&self) -> PathBuf {
        self.backups_dir().join(PathsConfig::REGISTRY_FILENAME)
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.backups_dir().join(PathsConfig::ARCHIVES_DIR_NAME)
    }

    pub fn archive_file(&self, backup_id: &str) -> Result<PathBuf> {
        validate_backup_id(backup_id)?;
        Ok(self
            .archives_dir()
            .join(format!("{}.{}", backup_id, PathsConfig::ARCHIVE_EXTENSION)))
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::LOCKS_DIR_NAME)
    }

    /// Sidecar lock guarding read-modify-write cycles on `document`.
    ///
    /// Lives outside the document's directory so directory scans never see
    /// it and deleting an entity never races with its lock file.
    pub fn lock_file_for(&self, document: &Path) -> PathBuf {
        let relative = document.strip_prefix(&self.root).unwrap_or(document);
        let flattened: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        self.locks_dir()
            .join(format!("{}{}", flattened.join("__"), PathsConfig::LOCK_SUFFIX))
    }

    /// Create the directory tree.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.servers_dir(),
            self.whitelists_dir(),
            self.archives_dir(),
            self.locks_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| StateError::Io {
                message: format!("Failed to create directory {}", dir.display()),
                path: Some(dir.clone()),
                source: Some(e),
            })?;
        }
        Ok(())
    }
}

/// `<name>.yaml`
pub(crate) fn document_name(stem: &str) -> String {
    format!("{}.{}", stem, PathsConfig::DOCUMENT_EXTENSION)
}

/// `<path><suffix>`, appending to the full file name rather than replacing
/// the extension.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
