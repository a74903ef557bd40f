//! Per-server documents under `servers/`.

use super::touch;
use crate::error::{EntityKind, Result, StateError};
use crate::models::{ModInfo, NewServer, OpInfo, ServerState, ServerStatus};
use crate::platform::StateLayout;
use crate::storage::{
    list_document_stems, read_document, remove_document, with_lock, write_document,
};
use crate::validation::{validate_server_name, Validate};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ServerStore {
    layout: StateLayout,
}

impl ServerStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    /// Path of the server's document. Validates `name`.
    pub fn server_path(&self, name: &str) -> Result<PathBuf> {
        self.layout.server_file(name)
    }

    /// Persist a brand-new stopped server. Fails if `name` is taken.
    pub fn create_server(&self, spec: NewServer) -> Result<ServerState> {
        let path = self.server_path(&spec.name)?;
        let state = ServerState::new(spec);
        with_lock(&self.layout.lock_file_for(&path), || {
            if path.exists() {
                return Err(StateError::already_exists(EntityKind::Server, &state.name));
            }
            write_document(&path, &state)
        })?;
        info!(server = %state.name, id = %state.id, "Created server");
        Ok(state)
    }

    pub fn load_server(&self, name: &str) -> Result<ServerState> {
        let path = self.server_path(name)?;
        read_server(name, &path)
    }

    /// Validate and write `state`, advancing its `updated_at`.
    pub fn save_server(&self, state: &mut ServerState) -> Result<()> {
        let path = self.server_path(&state.name)?;
        touch(&mut state.updated_at);
        with_lock(&self.layout.lock_file_for(&path), || write_document(&path, &*state))
    }

    pub fn delete_server(&self, name: &str) -> Result<()> {
        let path = self.server_path(name)?;
        let removed = with_lock(&self.layout.lock_file_for(&path), || remove_document(&path))?;
        if !removed {
            return Err(StateError::not_found(EntityKind::Server, name));
        }
        info!(server = %name, "Deleted server");
        Ok(())
    }

    pub fn server_exists(&self, name: &str) -> Result<bool> {
        Ok(self.server_path(name)?.is_file())
    }

    /// Names of all stored servers, sorted.
    pub fn list_servers(&self) -> Result<Vec<String>> {
        list_document_stems(&self.layout.servers_dir(), |stem| {
            validate_server_name(stem).is_ok()
        })
    }

    pub fn set_status(&self, name: &str, status: ServerStatus) -> Result<ServerState> {
        let state = self.update(name, |state| {
            state.set_status(status);
            Ok(())
        })?;
        debug!(server = %name, %status, "Updated server status");
        Ok(state)
    }

    pub fn add_mod(&self, name: &str, mod_info: ModInfo) -> Result<()> {
        mod_info.validate()?;
        let slug = mod_info.slug.clone();
        self.update(name, |state| {
            if state.find_mod(&mod_info.slug).is_some() {
                return Err(StateError::already_exists(EntityKind::Mod, &mod_info.slug));
            }
            state.mods.push(mod_info);
            Ok(())
        })?;
        debug!(server = %name, mod_slug = %slug, "Added mod");
        Ok(())
    }

    /// Remove the mod with `slug`, returning its record.
    pub fn remove_mod(&self, name: &str, slug: &str) -> Result<ModInfo> {
        let (_, removed) = self.update_with(name, |state| {
            let index = state
                .mods
                .iter()
                .position(|m| m.slug == slug)
                .ok_or_else(|| StateError::not_found(EntityKind::Mod, slug))?;
            Ok(state.mods.remove(index))
        })?;
        debug!(server = %name, mod_slug = %slug, "Removed mod");
        Ok(removed)
    }

    pub fn add_op(&self, name: &str, op: OpInfo) -> Result<()> {
        op.validate()?;
        let uuid = op.uuid.clone();
        self.update(name, |state| {
            if state.find_op(&op.uuid).is_some() {
                return Err(StateError::already_exists(EntityKind::Operator, &op.uuid));
            }
            state.ops.push(op);
            Ok(())
        })?;
        debug!(server = %name, %uuid, "Added operator");
        Ok(())
    }

    pub fn remove_op(&self, name: &str, uuid: &str) -> Result<OpInfo> {
        let (_, removed) = self.update_with(name, |state| {
            let index = state
                .ops
                .iter()
                .position(|op| op.uuid.eq_ignore_ascii_case(uuid))
                .ok_or_else(|| StateError::not_found(EntityKind::Operator, uuid))?;
            Ok(state.ops.remove(index))
        })?;
        debug!(server = %name, %uuid, "Removed operator");
        Ok(removed)
    }

    /// Reference an existing whitelist from the server.
    pub fn attach_whitelist(&self, name: &str, whitelist: &str) -> Result<()> {
        if !self.layout.whitelist_file(whitelist)?.is_file() {
            return Err(StateError::not_found(EntityKind::Whitelist, whitelist));
        }
        self.update(name, |state| {
            if state.whitelists.iter().any(|w| w == whitelist) {
                return Err(StateError::already_exists(
                    EntityKind::WhitelistReference,
                    whitelist,
                ));
            }
            state.whitelists.push(whitelist.to_string());
            Ok(())
        })?;
        debug!(server = %name, %whitelist, "Attached whitelist");
        Ok(())
    }

    pub fn detach_whitelist(&self, name: &str, whitelist: &str) -> Result<()> {
        self.update(name, |state| {
            let before = state.whitelists.len();
            state.whitelists.retain(|w| w != whitelist);
            if state.whitelists.len() == before {
                return Err(StateError::not_found(
                    EntityKind::WhitelistReference,
                    whitelist,
                ));
            }
            Ok(())
        })?;
        debug!(server = %name, %whitelist, "Detached whitelist");
        Ok(())
    }

    /// Locked load-mutate-save; returns the saved state.
    fn update(
        &self,
        name: &str,
        mutate: impl FnOnce(&mut ServerState) -> Result<()>,
    ) -> Result<ServerState> {
        self.update_with(name, mutate).map(|(state, ())| state)
    }

    fn update_with<R>(
        &self,
        name: &str,
        mutate: impl FnOnce(&mut ServerState) -> Result<R>,
    ) -> Result<(ServerState, R)> {
        let path = self.server_path(name)?;
        with_lock(&self.layout.lock_file_for(&path), || {
            let mut state = read_server(name, &path)?;
            let result = mutate(&mut state)?;
            touch(&mut state.updated_at);
            write_document(&path, &state)?;
            Ok((state, result))
        })
    }
}

fn read_server(name: &str, path: &Path) -> Result<ServerState> {
    let state: ServerState =
        read_document(path)?.ok_or_else(|| StateError::not_found(EntityKind::Server, name))?;
    if state.name != name {
        return Err(StateError::validation(
            "server name",
            &state.name,
            format!("does not match its file name '{name}'"),
        ));
    }
    Ok(state)
}
