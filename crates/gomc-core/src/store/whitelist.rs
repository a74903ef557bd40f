//! Named whitelists under `whitelists/`.

use super::touch;
use crate::error::{EntityKind, Result, StateError};
use crate::models::{PlayerInfo, WhitelistState};
use crate::platform::StateLayout;
use crate::storage::{
    list_document_stems, read_document, remove_document, with_lock, write_document,
};
use crate::validation::{validate_player_name, validate_uuid, validate_whitelist_name};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct WhitelistStore {
    layout: StateLayout,
}

impl WhitelistStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn whitelist_path(&self, name: &str) -> Result<PathBuf> {
        self.layout.whitelist_file(name)
    }

    /// Persist a new, empty whitelist. Fails if `name` is taken.
    pub fn create_whitelist(&self, name: &str) -> Result<WhitelistState> {
        let path = self.whitelist_path(name)?;
        let state = WhitelistState::new(name);
        with_lock(&self.layout.lock_file_for(&path), || {
            if path.exists() {
                return Err(StateError::already_exists(EntityKind::Whitelist, name));
            }
            write_document(&path, &state)
        })?;
        info!(whitelist = %name, "Created whitelist");
        Ok(state)
    }

    pub fn load_whitelist(&self, name: &str) -> Result<WhitelistState> {
        let path = self.whitelist_path(name)?;
        read_whitelist(name, &path)
    }

    pub fn save_whitelist(&self, state: &mut WhitelistState) -> Result<()> {
        let path = self.whitelist_path(&state.name)?;
        touch(&mut state.updated_at);
        with_lock(&self.layout.lock_file_for(&path), || write_document(&path, &*state))
    }

    /// Remove the whitelist document. Servers referencing it keep the name.
    pub fn delete_whitelist(&self, name: &str) -> Result<()> {
        let path = self.whitelist_path(name)?;
        let removed = with_lock(&self.layout.lock_file_for(&path), || remove_document(&path))?;
        if !removed {
            return Err(StateError::not_found(EntityKind::Whitelist, name));
        }
        info!(whitelist = %name, "Deleted whitelist");
        Ok(())
    }

    pub fn whitelist_exists(&self, name: &str) -> Result<bool> {
        Ok(self.whitelist_path(name)?.is_file())
    }

    pub fn list_whitelists(&self) -> Result<Vec<String>> {
        list_document_stems(&self.layout.whitelists_dir(), |stem| {
            validate_whitelist_name(stem).is_ok()
        })
    }

    /// Add a player. UUIDs are compared case-insensitively.
    pub fn add_player(&self, name: &str, uuid: &str, player_name: &str) -> Result<()> {
        validate_uuid(uuid)?;
        validate_player_name(player_name)?;
        self.update(name, |state| {
            if state.find_player(uuid).is_some() {
                return Err(StateError::already_exists(EntityKind::Player, uuid));
            }
            state.players.push(PlayerInfo::new(uuid, player_name));
            Ok(())
        })?;
        debug!(whitelist = %name, %uuid, player = %player_name, "Added player");
        Ok(())
    }

    pub fn remove_player(&self, name: &str, uuid: &str) -> Result<PlayerInfo> {
        let removed = self.update(name, |state| {
            let index = state
                .players
                .iter()
                .position(|player| player.uuid.eq_ignore_ascii_case(uuid))
                .ok_or_else(|| StateError::not_found(EntityKind::Player, uuid))?;
            Ok(state.players.remove(index))
        })?;
        debug!(whitelist = %name, %uuid, "Removed player");
        Ok(removed)
    }

    /// Players in insertion order.
    pub fn list_players(&self, name: &str) -> Result<Vec<PlayerInfo>> {
        Ok(self.load_whitelist(name)?.players)
    }

    fn update<R>(
        &self,
        name: &str,
        mutate: impl FnOnce(&mut WhitelistState) -> Result<R>,
    ) -> Result<R> {
        let path = self.whitelist_path(name)?;
        with_lock(&self.layout.lock_file_for(&path), || {
            let mut state = read_whitelist(name, &path)?;
            let result = mutate(&mut state)?;
            touch(&mut state.updated_at);
            write_document(&path, &state)?;
            Ok(result)
        })
    }
}

fn read_whitelist(name: &str, path: &Path) -> Result<WhitelistState> {
    let state: WhitelistState =
        read_document(path)?.ok_or_else(|| StateError::not_found(EntityKind::Whitelist, name))?;
    if state.name != name {
        return Err(StateError::validation(
            "whitelist name",
            &state.name,
            format!("does not match its file name '{name}'"),
        ));
    }
    Ok(state)
}
