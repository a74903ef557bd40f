//! Resource pool: allocated ports and registered server names.

use super::{load_or_create, update_singleton};
use crate::config::StoreConfig;
use crate::error::{EntityKind, Result, StateError};
use crate::models::GlobalState;
use crate::platform::StateLayout;
use crate::validation::{validate_port, validate_server_name};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::debug;

/// Store for `state.yaml`.
///
/// Every mutation holds the pool's lock across load, change and save, so two
/// processes allocating at once can never hand out the same port.
#[derive(Debug, Clone)]
pub struct GlobalStore {
    layout: StateLayout,
}

impl GlobalStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    fn path(&self) -> PathBuf {
        self.layout.state_file()
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut GlobalState) -> Result<R>) -> Result<R> {
        update_singleton(&self.layout, &self.path(), mutate)
    }

    /// Load the pool, creating an empty one on first use.
    ///
    /// An unreadable file is quarantined and replaced with an empty pool.
    pub fn load_global_state(&self) -> Result<GlobalState> {
        load_or_create(&self.layout, &self.path())
    }

    /// Locked load-mutate-save of the whole pool, returning the saved state.
    ///
    /// `mutate` always sees the state as it is on disk, never a stale copy.
    pub fn update_global_state(
        &self,
        mutate: impl FnOnce(&mut GlobalState) -> Result<()>,
    ) -> Result<GlobalState> {
        self.update(|state| {
            mutate(state)?;
            Ok(state.clone())
        })
    }

    /// Mark `port` as in use. Fails if it already is.
    pub fn allocate_port(&self, port: u32) -> Result<()> {
        validate_port(port)?;
        self.update(|state| {
            if !state.allocate_port(port) {
                return Err(StateError::already_exists(EntityKind::Port, port));
            }
            Ok(())
        })?;
        debug!("Allocated port {}", port);
        Ok(())
    }

    /// Return `port` to the pool. Fails if it was not allocated.
    pub fn release_port(&self, port: u32) -> Result<()> {
        self.update(|state| {
            if !state.release_port(port) {
                return Err(StateError::not_found(EntityKind::Port, port));
            }
            Ok(())
        })?;
        debug!("Released port {}", port);
        Ok(())
    }

    pub fn is_port_allocated(&self, port: u32) -> Result<bool> {
        Ok(self.load_global_state()?.is_port_allocated(port))
    }

    /// First unallocated port at or above `start`. Allocates nothing.
    pub fn next_available_port(&self, start: u32) -> Result<u32> {
        self.load_global_state()?
            .first_free_port(start, StoreConfig::MAX_PORT)
            .ok_or(StateError::PortsExhausted { start })
    }

    /// Find and allocate the first free port at or above `start` in one
    /// locked step.
    pub fn allocate_next_port(&self, start: u32) -> Result<u32> {
        let port = self.update(|state| {
            let port = state
                .first_free_port(start, StoreConfig::MAX_PORT)
                .ok_or(StateError::PortsExhausted { start })?;
            state.allocate_port(port);
            Ok(port)
        })?;
        debug!("Allocated port {} (searched from {})", port, start);
        Ok(port)
    }

    pub fn register_server(&self, name: &str) -> Result<()> {
        validate_server_name(name)?;
        self.update(|state| {
            if !state.register_server(name) {
                return Err(StateError::already_exists(EntityKind::Registration, name));
            }
            Ok(())
        })?;
        debug!("Registered server {}", name);
        Ok(())
    }

    pub fn unregister_server(&self, name: &str) -> Result<()> {
        self.update(|state| {
            if !state.unregister_server(name) {
                return Err(StateError::not_found(EntityKind::Registration, name));
            }
            Ok(())
        })?;
        debug!("Unregistered server {}", name);
        Ok(())
    }

    pub fn is_server_registered(&self, name: &str) -> Result<bool> {
        Ok(self.load_global_state()?.is_server_registered(name))
    }

    /// Registered server names in sorted order.
    pub fn registered_servers(&self) -> Result<Vec<String>> {
        Ok(self.load_global_state()?.servers)
    }

    /// Record that a garbage-collection pass just ran.
    pub fn update_gc_timestamp(&self) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.update(|state| {
            state.last_gc_run = Some(now);
            Ok(())
        })?;
        Ok(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> GlobalStore {
        GlobalStore::new(StateLayout::new(temp_dir.path()))
    }

    #[test]
    fn test_first_load_creates_empty_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let state = store.load_global_state().unwrap();
        assert_eq!(state, GlobalState::default());
        assert!(temp_dir.path().join("state.yaml").exists());
    }

    #[test]
    fn test_allocate_and_release() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store.allocate_port(25565).unwrap();
        assert!(store.is_port_allocated(25565).unwrap());
        assert!(store.allocate_port(25565).unwrap_err().is_conflict());

        store.release_port(25565).unwrap();
        assert!(!store.is_port_allocated(25565).unwrap());
        assert!(store.release_port(25565).unwrap_err().is_not_found());
    }

    #[test]
    fn test_allocate_rejects_invalid_port() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        assert!(matches!(
            store.allocate_port(0),
            Err(StateError::Validation { .. })
        ));
    }

    #[test]
    fn test_next_available_port_does_not_allocate() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.allocate_port(25565).unwrap();
        store.allocate_port(25566).unwrap();

        assert_eq!(store.next_available_port(25565).unwrap(), 25567);
        assert_eq!(store.next_available_port(25565).unwrap(), 25567);
        assert!(!store.is_port_allocated(25567).unwrap());
    }

    #[test]
    fn test_next_available_port_exhausted() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.allocate_port(65535).unwrap();
        assert!(matches!(
            store.next_available_port(65535),
            Err(StateError::PortsExhausted { start: 65535 })
        ));
    }

    #[test]
    fn test_allocate_next_port() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        assert_eq!(store.allocate_next_port(25565).unwrap(), 25565);
        assert_eq!(store.allocate_next_port(25565).unwrap(), 25566);
        assert!(store.is_port_allocated(25566).unwrap());
    }

    #[test]
    fn test_register_and_unregister() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store.register_server("survival").unwrap();
        store.register_server("lobby").unwrap();
        let err = store.register_server("lobby").unwrap_err();
        assert_eq!(err.to_string(), "server 'lobby' is already registered");
        assert_eq!(
            store.registered_servers().unwrap(),
            vec!["lobby".to_string(), "survival".to_string()]
        );

        store.unregister_server("lobby").unwrap();
        assert!(!store.is_server_registered("lobby").unwrap());
        let err = store.unregister_server("lobby").unwrap_err();
        assert_eq!(err.to_string(), "server 'lobby' is not registered");
    }

    #[test]
    fn test_update_gc_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let stamped = store.update_gc_timestamp().unwrap();
        assert_eq!(store.load_global_state().unwrap().last_gc_run, Some(stamped));
    }

    #[test]
    fn test_update_global_state_sees_fresh_allocations() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let stale = store.load_global_state().unwrap();
        store.allocate_port(25565).unwrap();
        assert!(!stale.is_port_allocated(25565));

        let stamp = Utc::now();
        let saved = store
            .update_global_state(|state| {
                assert!(state.is_port_allocated(25565));
                state.last_gc_run = Some(stamp);
                Ok(())
            })
            .unwrap();
        assert!(saved.is_port_allocated(25565));
        assert_eq!(saved.last_gc_run, Some(stamp));
        assert!(store.is_port_allocated(25565).unwrap());
    }

    #[test]
    fn test_update_global_state_refuses_invalid_result() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.allocate_port(25565).unwrap();

        let result = store.update_global_state(|state| {
            state.allocated_ports.push(25565);
            Ok(())
        });
        assert!(matches!(result, Err(StateError::Validation { .. })));
        assert_eq!(store.load_global_state().unwrap().allocated_ports, vec![25565]);
    }

    #[test]
    fn test_duplicate_entries_on_disk_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let path = temp_dir.path().join("state.yaml");
        std::fs::write(&path, "allocated_ports: [25565, 25565]\n").unwrap();

        assert!(matches!(
            store.load_global_state(),
            Err(StateError::Validation { .. })
        ));
        assert!(store.allocate_port(25566).is_err());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "allocated_ports: [25565, 25565]\n"
        );
    }

    #[test]
    fn test_corrupt_state_falls_back_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        std::fs::write(temp_dir.path().join("state.yaml"), "servers: [unclosed\n").unwrap();

        let state = store.load_global_state().unwrap();
        assert_eq!(state, GlobalState::default());
        assert!(temp_dir.path().join("state.yaml.corrupted").exists());
    }
}
