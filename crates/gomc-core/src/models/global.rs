//! Tool-wide resource pool: `state.yaml`.

use crate::error::{Result, StateError};
use crate::validation::{validate_port, validate_server_name, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ports handed out to servers and the names of registered servers.
///
/// Both lists are kept sorted and hold each value at most once. They are
/// stored as plain sequences so that a hand-edited duplicate fails
/// validation instead of being merged silently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    #[serde(default)]
    pub allocated_ports: Vec<u32>,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_gc_run: Option<DateTime<Utc>>,
}

impl GlobalState {
    pub fn is_port_allocated(&self, port: u32) -> bool {
        self.allocated_ports.contains(&port)
    }

    /// Record `port`. Returns `false` if it was already allocated.
    pub fn allocate_port(&mut self, port: u32) -> bool {
        insert_sorted(&mut self.allocated_ports, port)
    }

    /// Forget `port`. Returns `false` if it was not allocated.
    pub fn release_port(&mut self, port: u32) -> bool {
        remove_sorted(&mut self.allocated_ports, &port)
    }

    pub fn is_server_registered(&self, name: &str) -> bool {
        self.servers.iter().any(|server| server == name)
    }

    pub fn register_server(&mut self, name: &str) -> bool {
        insert_sorted(&mut self.servers, name.to_string())
    }

    pub fn unregister_server(&mut self, name: &str) -> bool {
        match self.servers.iter().position(|server| server == name) {
            Some(index) => {
                self.servers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Lowest port at or above `start` that is not allocated.
    pub fn first_free_port(&self, start: u32, max: u32) -> Option<u32> {
        let allocated: HashSet<u32> = self.allocated_ports.iter().copied().collect();
        (start.max(1)..=max).find(|port| !allocated.contains(port))
    }
}

fn insert_sorted<T: Ord>(values: &mut Vec<T>, value: T) -> bool {
    if values.contains(&value) {
        return false;
    }
    let index = values.partition_point(|existing| *existing < value);
    values.insert(index, value);
    true
}

fn remove_sorted<T: PartialEq>(values: &mut Vec<T>, value: &T) -> bool {
    match values.iter().position(|existing| existing == value) {
        Some(index) => {
            values.remove(index);
            true
        }
        None => false,
    }
}

impl Validate for GlobalState {
    fn validate(&self) -> Result<()> {
        let mut ports = HashSet::new();
        for port in &self.allocated_ports {
            validate_port(*port)?;
            if !ports.insert(*port) {
                return Err(StateError::validation(
                    "allocated ports",
                    port,
                    "port appears more than once",
                ));
            }
        }
        let mut servers = HashSet::new();
        for server in &self.servers {
            validate_server_name(server)?;
            if !servers.insert(server.as_str()) {
                return Err(StateError::validation(
                    "servers",
                    server,
                    "name appears more than once",
                ));
            }
        }
        Ok(())
    }
}
