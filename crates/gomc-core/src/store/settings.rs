//! User configuration (`config.yaml`).

use super::{load_or_create, update_singleton};
use crate::error::Result;
use crate::models::Config;
use crate::platform::StateLayout;
use crate::storage::{with_lock, write_document_with_backup};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    layout: StateLayout,
}

impl ConfigStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn path(&self) -> PathBuf {
        self.layout.config_file()
    }

    /// Load the configuration, writing defaults on first use.
    ///
    /// An unparsable file is quarantined to `config.yaml.corrupted` and
    /// replaced by defaults. A file that parses but holds invalid values is
    /// an error so the user can fix it by hand.
    pub fn load_config(&self) -> Result<Config> {
        load_or_create(&self.layout, &self.path())
    }

    /// Save, keeping the previous file as `config.yaml.bak`.
    pub fn save_config(&self, config: &Config) -> Result<()> {
        let path = self.path();
        with_lock(&self.layout.lock_file_for(&path), || {
            write_document_with_backup(&path, config)
        })?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Locked load-mutate-save of the configuration.
    pub fn update_config(&self, mutate: impl FnOnce(&mut Config)) -> Result<Config> {
        update_singleton(&self.layout, &self.path(), |config: &mut Config| {
            mutate(config);
            Ok(config.clone())
        })
    }
}
