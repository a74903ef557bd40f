//! User configuration: `config.yaml`.
//!
//! Every section is `#[serde(default)]`, so a hand-edited file that only sets
//! a few keys still loads with the remaining values filled in.

use crate::config::DefaultsConfig;
use crate::error::{Result, StateError};
use crate::validation::{
    memory_to_megabytes, validate_java_version, validate_memory, validate_path,
    validate_port_range, validate_token, validate_version, Validate,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    #[default]
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Executable name of the runtime CLI.
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    pub runtime: ContainerRuntime,
    pub image: String,
    pub network: String,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            runtime: ContainerRuntime::default(),
            image: DefaultsConfig::CONTAINER_IMAGE.to_string(),
            network: DefaultsConfig::CONTAINER_NETWORK.to_string(),
        }
    }
}

/// Values applied to newly created servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerDefaults {
    pub minecraft_version: String,
    pub java_version: u32,
    pub memory: String,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        Self {
            minecraft_version: DefaultsConfig::MINECRAFT_VERSION.to_string(),
            java_version: DefaultsConfig::JAVA_VERSION,
            memory: DefaultsConfig::MEMORY.to_string(),
        }
    }
}

/// Port ranges scanned when allocating game and RCON ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    pub game_port_start: u32,
    pub game_port_end: u32,
    pub rcon_port_start: u32,
    pub rcon_port_end: u32,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            game_port_start: DefaultsConfig::GAME_PORT_START,
            game_port_end: DefaultsConfig::GAME_PORT_END,
            rcon_port_start: DefaultsConfig::RCON_PORT_START,
            rcon_port_end: DefaultsConfig::RCON_PORT_END,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Backups kept per server by the retention pass.
    pub keep_count: u32,
    pub compress: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            keep_count: DefaultsConfig::BACKUP_KEEP_COUNT,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub max_servers: u32,
    pub max_memory: String,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_servers: DefaultsConfig::MAX_SERVERS,
            max_memory: DefaultsConfig::MAX_MEMORY.to_string(),
        }
    }
}

/// The whole of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub container: ContainerSettings,
    pub defaults: ServerDefaults,
    pub ports: PortSettings,
    pub backups: BackupSettings,
    pub logging: LoggingConfig,
    pub limits: LimitSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<()> {
        validate_token("container image", &self.container.image)?;
        validate_token("container network", &self.container.network)?;

        validate_version(&self.defaults.minecraft_version)?;
        validate_java_version(self.defaults.java_version)?;
        validate_memory(&self.defaults.memory)?;

        validate_port_range(
            "game port range",
            self.ports.game_port_start,
            self.ports.game_port_end,
        )?;
        validate_port_range(
            "rcon port range",
            self.ports.rcon_port_start,
            self.ports.rcon_port_end,
        )?;

        if self.backups.keep_count == 0 {
            return Err(StateError::validation(
                "backup keep count",
                self.backups.keep_count,
                "must be at least 1",
            ));
        }

        if let Some(file) = &self.logging.file {
            validate_path(file)?;
        }

        if self.limits.max_servers == 0 {
            return Err(StateError::validation(
                "max servers",
                self.limits.max_servers,
                "must be at least 1",
            ));
        }
        let max_memory = memory_to_megabytes(&self.limits.max_memory)?;
        if memory_to_megabytes(&self.defaults.memory)? > max_memory {
            return Err(StateError::validation(
                "default memory",
                &self.defaults.memory,
                format!("exceeds the limit of {}", self.limits.max_memory),
            ));
        }

        Ok(())
    }
}
