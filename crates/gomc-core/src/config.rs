//! Centralized constants for the state store.
//!
//! File names, permission bits and the default values written into a fresh
//! `config.yaml` all live here so the layout and the defaults are declared once.

/// Names of files and directories under the configuration root.
pub struct PathsConfig;

impl PathsConfig {
    /// Environment variable overriding the configuration root.
    pub const CONFIG_DIR_ENV: &'static str = "GO_MC_CONFIG_DIR";
    /// Directory created under the home directory when no override is set.
    pub const APP_DIR_NAME: &'static str = ".go-mc";

    pub const CONFIG_FILENAME: &'static str = "config.yaml";
    pub const STATE_FILENAME: &'static str = "state.yaml";
    pub const PID_FILENAME: &'static str = "go-mc.pid";
    pub const SERVERS_DIR_NAME: &'static str = "servers";
    pub const WHITELISTS_DIR_NAME: &'static str = "whitelists";
    pub const BACKUPS_DIR_NAME: &'static str = "backups";
    pub const ARCHIVES_DIR_NAME: &'static str = "archives";
    pub const REGISTRY_FILENAME: &'static str = "registry.yaml";
    pub const LOCKS_DIR_NAME: &'static str = "locks";

    pub const DOCUMENT_EXTENSION: &'static str = "yaml";
    pub const ARCHIVE_EXTENSION: &'static str = "tar.gz";
    pub const BACKUP_SUFFIX: &'static str = ".bak";
    pub const CORRUPTED_SUFFIX: &'static str = ".corrupted";
    pub const LOCK_SUFFIX: &'static str = ".lock";
    pub const TEMP_SUFFIX: &'static str = ".tmp";
}

/// Persistence behaviour.
pub struct StoreConfig;

impl StoreConfig {
    /// Mode applied to every entity document.
    pub const FILE_MODE: u32 = 0o644;
    /// Mode applied to the PID file.
    pub const PID_FILE_MODE: u32 = 0o644;
    /// Highest port number the pool will hand out.
    pub const MAX_PORT: u32 = 65_535;
}

/// Defaults written to a freshly created `config.yaml`.
pub struct DefaultsConfig;

impl DefaultsConfig {
    pub const CONTAINER_IMAGE: &'static str = "itzg/minecraft-server:latest";
    pub const CONTAINER_NETWORK: &'static str = "go-mc";
    pub const MINECRAFT_VERSION: &'static str = "1.21.1";
    pub const JAVA_VERSION: u32 = 21;
    pub const MEMORY: &'static str = "2G";
    pub const GAME_PORT_START: u32 = 25_565;
    pub const GAME_PORT_END: u32 = 25_664;
    pub const RCON_PORT_START: u32 = 25_575;
    pub const RCON_PORT_END: u32 = 25_674;
    pub const BACKUP_KEEP_COUNT: u32 = 5;
    pub const MAX_SERVERS: u32 = 10;
    pub const MAX_MEMORY: &'static str = "16G";
}

/// Java runtimes accepted for a server.
pub const ALLOWED_JAVA_VERSIONS: &[u32] = &[8, 11, 17, 21];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_java_is_allowed() {
        assert!(ALLOWED_JAVA_VERSIONS.contains(&DefaultsConfig::JAVA_VERSION));
    }

    #[test]
    fn test_default_port_ranges_are_ordered() {
        assert!(DefaultsConfig::GAME_PORT_START <= DefaultsConfig::GAME_PORT_END);
        assert!(DefaultsConfig::RCON_PORT_START <= DefaultsConfig::RCON_PORT_END);
        assert!(DefaultsConfig::GAME_PORT_END <= StoreConfig::MAX_PORT);
    }
}
