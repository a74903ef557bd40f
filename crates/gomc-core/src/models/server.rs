//! Per-server state: `servers/<name>.yaml`.

use crate::error::{Result, StateError};
use crate::validation::{
    validate_filename, validate_java_version, validate_memory, validate_mod_slug,
    validate_op_level, validate_path, validate_player_name, validate_port, validate_server_name,
    validate_token, validate_uuid, validate_version, validate_whitelist_name, Validate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Lifecycle state of a server container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Stopped,
    Running,
    Starting,
    Stopping,
}

impl ServerStatus {
    pub const ALL: [ServerStatus; 4] = [
        ServerStatus::Stopped,
        ServerStatus::Running,
        ServerStatus::Starting,
        ServerStatus::Stopping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Stopped => "stopped",
            ServerStatus::Running => "running",
            ServerStatus::Starting => "starting",
            ServerStatus::Stopping => "stopping",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                StateError::validation(
                    "status",
                    s,
                    "must be one of stopped, running, starting, stopping",
                )
            })
    }
}

/// How a mod relates to one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Required,
    Optional,
    Incompatible,
    Embedded,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Required => "required",
            DependencyType::Optional => "optional",
            DependencyType::Incompatible => "incompatible",
            DependencyType::Embedded => "embedded",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "required" => Ok(DependencyType::Required),
            "optional" => Ok(DependencyType::Optional),
            "incompatible" => Ok(DependencyType::Incompatible),
            "embedded" => Ok(DependencyType::Embedded),
            _ => Err(StateError::validation(
                "dependency type",
                s,
                "must be one of required, optional, incompatible, embedded",
            )),
        }
    }
}

/// Minecraft runtime settings for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinecraftConfig {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric_version: Option<String>,
    pub java_version: u32,
    pub memory: String,
    pub game_port: u32,
    pub rcon_port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcon_password: Option<String>,
}

impl Validate for MinecraftConfig {
    fn validate(&self) -> Result<()> {
        validate_version(&self.version)?;
        if let Some(fabric) = &self.fabric_version {
            validate_version(fabric)?;
        }
        validate_java_version(self.java_version)?;
        validate_memory(&self.memory)?;
        validate_port(self.game_port)?;
        validate_port(self.rcon_port)?;
        if self.game_port == self.rcon_port {
            return Err(StateError::validation(
                "rcon port",
                self.rcon_port,
                "must differ from the game port",
            ));
        }
        Ok(())
    }
}

/// Host directories mounted into the server container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumePaths {
    pub data: String,
    pub mods: String,
    pub config: String,
    pub logs: String,
    pub backups: String,
}

impl VolumePaths {
    /// Standard sub-directories of `base`.
    pub fn under(base: &Path) -> Self {
        let sub = |name: &str| base.join(name).to_string_lossy().into_owned();
        Self {
            data: sub("data"),
            mods: sub("mods"),
            config: sub("config"),
            logs: sub("logs"),
            backups: sub("backups"),
        }
    }
}

impl Validate for VolumePaths {
    fn validate(&self) -> Result<()> {
        for path in [
            &self.data,
            &self.mods,
            &self.config,
            &self.logs,
            &self.backups,
        ] {
            validate_path(path)?;
        }
        Ok(())
    }
}

/// The container backing a server, once one has been created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModDependency {
    pub project_id: String,
    pub dependency_type: DependencyType,
}

/// An installed mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModInfo {
    pub slug: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<ModDependency>,
    pub installed_at: DateTime<Utc>,
}

impl Validate for ModInfo {
    fn validate(&self) -> Result<()> {
        validate_mod_slug(&self.slug)?;
        if self.name.trim().is_empty() {
            return Err(StateError::validation("mod name", &self.name, "must not be empty"));
        }
        validate_version(&self.version)?;
        validate_filename("mod filename", &self.filename)?;
        for dependency in &self.dependencies {
            if dependency.project_id.trim().is_empty() {
                return Err(StateError::validation(
                    "dependency project id",
                    &dependency.project_id,
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }
}

/// A server operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpInfo {
    pub uuid: String,
    pub name: String,
    pub level: u8,
    #[serde(default)]
    pub bypasses_player_limit: bool,
    pub added_at: DateTime<Utc>,
}

impl OpInfo {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>, level: u8) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            level,
            bypasses_player_limit: false,
            added_at: Utc::now(),
        }
    }
}

impl Validate for OpInfo {
    fn validate(&self) -> Result<()> {
        validate_uuid(&self.uuid)?;
        validate_player_name(&self.name)?;
        validate_op_level(self.level)
    }
}

/// Inputs for a brand-new server.
#[derive(Debug, Clone)]
pub struct NewServer {
    pub name: String,
    pub minecraft: MinecraftConfig,
    pub volumes: VolumePaths,
}

/// Everything go-mc knows about one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerState {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: ServerStatus,
    pub minecraft: MinecraftConfig,
    pub volumes: VolumePaths,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerInfo>,
    #[serde(default)]
    pub mods: Vec<ModInfo>,
    #[serde(default)]
    pub ops: Vec<OpInfo>,
    #[serde(default)]
    pub whitelists: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stopped: Option<DateTime<Utc>>,
}

impl ServerState {
    /// A stopped server with a fresh id and no mods, ops or whitelists.
    pub fn new(spec: NewServer) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: spec.name,
            status: ServerStatus::Stopped,
            minecraft: spec.minecraft,
            volumes: spec.volumes,
            container: None,
            mods: Vec::new(),
            ops: Vec::new(),
            whitelists: Vec::new(),
            created_at: now,
            updated_at: now,
            last_started: None,
            last_stopped: None,
        }
    }

    pub fn find_mod(&self, slug: &str) -> Option<&ModInfo> {
        self.mods.iter().find(|m| m.slug == slug)
    }

    pub fn find_op(&self, uuid: &str) -> Option<&OpInfo> {
        self.ops.iter().find(|op| op.uuid.eq_ignore_ascii_case(uuid))
    }

    /// Move to `status`, stamping the start/stop time where it applies.
    pub fn set_status(&mut self, status: ServerStatus) {
        let now = Utc::now();
        match status {
            ServerStatus::Running => self.last_started = Some(now),
            ServerStatus::Stopped => self.last_stopped = Some(now),
            ServerStatus::Starting | ServerStatus::Stopping => {}
        }
        self.status = status;
    }
}

impl Validate for ServerState {
    fn validate(&self) -> Result<()> {
        validate_uuid(&self.id)?;
        validate_server_name(&self.name)?;
        self.minecraft.validate()?;
        self.volumes.validate()?;

        if let Some(container) = &self.container {
            if container.id.trim().is_empty() {
                return Err(StateError::validation(
                    "container id",
                    &container.id,
                    "must not be empty",
                ));
            }
            validate_token("container image", &container.image)?;
        }

        let mut slugs = HashSet::new();
        for mod_info in &self.mods {
            mod_info.validate()?;
            if !slugs.insert(mod_info.slug.as_str()) {
                return Err(StateError::validation(
                    "mods",
                    &mod_info.slug,
                    "slug appears more than once",
                ));
            }
        }

        let mut op_uuids = HashSet::new();
        for op in &self.ops {
            op.validate()?;
            if !op_uuids.insert(op.uuid.to_ascii_lowercase()) {
                return Err(StateError::validation(
                    "ops",
                    &op.uuid,
                    "uuid appears more than once",
                ));
            }
        }

        let mut whitelists = HashSet::new();
        for whitelist in &self.whitelists {
            validate_whitelist_name(whitelist)?;
            if !whitelists.insert(whitelist.as_str()) {
                return Err(StateError::validation(
                    "whitelists",
                    whitelist,
                    "referenced more than once",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    pub(crate) fn sample_new_server(name: &str) -> NewServer {
        NewServer {
            name: name.to_string(),
            minecraft: MinecraftConfig {
                version: "1.21.1".to_string(),
                fabric_version: Some("0.16.5".to_string()),
                java_version: 21,
                memory: "2G".to_string(),
                game_port: 25565,
                rcon_port: 25575,
                rcon_password: None,
            },
            volumes: VolumePaths::under(&PathBuf::from("/srv/go-mc").join(name)),
        }
    }

    pub(crate) fn sample_mod(slug: &str) -> ModInfo {
        ModInfo {
            slug: slug.to_string(),
            name: slug.to_string(),
            version: "1.0.0".to_string(),
            version_id: None,
            filename: format!("{slug}-1.0.0.jar"),
            url: None,
            sha512: None,
            dependencies: vec![ModDependency {
                project_id: "P7dR8mSH".to_string(),
                dependency_type: DependencyType::Required,
            }],
            installed_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_server_is_valid() {
        let server = ServerState::new(sample_new_server("lobby"));
        server.validate().unwrap();
        assert_eq!(server.status, ServerStatus::Stopped);
        assert_eq!(server.created_at, server.updated_at);
    }

    #[test]
    fn test_status_parsing_is_closed() {
        assert_eq!("running".parse::<ServerStatus>().unwrap(), ServerStatus::Running);
        assert!("paused".parse::<ServerStatus>().is_err());
        assert!("Running".parse::<ServerStatus>().is_err());
    }

    #[test]
    fn test_unknown_status_fails_to_deserialize() {
        assert!(serde_yaml_ng::from_str::<ServerStatus>("paused").is_err());
        assert_eq!(
            serde_yaml_ng::from_str::<ServerStatus>("stopping").unwrap(),
            ServerStatus::Stopping
        );
    }

    #[test]
    fn test_dependency_type_parsing() {
        assert_eq!(
            "embedded".parse::<DependencyType>().unwrap(),
            DependencyType::Embedded
        );
        assert!("recommended".parse::<DependencyType>().is_err());
    }

    #[test]
    fn test_duplicate_mod_slug_is_invalid() {
        let mut server = ServerState::new(sample_new_server("lobby"));
        server.mods.push(sample_mod("sodium"));
        server.mods.push(sample_mod("sodium"));
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_duplicate_op_uuid_is_invalid_case_insensitively() {
        let mut server = ServerState::new(sample_new_server("lobby"));
        server
            .ops
            .push(OpInfo::new("069a79f4-44e9-4726-a5be-fca90e38aaf5", "Notch", 4));
        server
            .ops
            .push(OpInfo::new("069A79F4-44E9-4726-A5BE-FCA90E38AAF5", "Notch", 4));
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let mut server = ServerState::new(sample_new_server("lobby"));
        server.minecraft.memory = "2 G".to_string();
        assert!(server.validate().is_err());

        let mut server = ServerState::new(sample_new_server("lobby"));
        server.minecraft.rcon_port = 70000;
        assert!(server.validate().is_err());

        let mut server = ServerState::new(sample_new_server("lobby"));
        server.volumes.data = "/srv/../etc".to_string();
        assert!(server.validate().is_err());

        let mut server = ServerState::new(sample_new_server("lobby"));
        server.id = "not-a-uuid".to_string();
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_set_status_stamps_times() {
        let mut server = ServerState::new(sample_new_server("lobby"));
        server.set_status(ServerStatus::Running);
        assert!(server.last_started.is_some());
        assert!(server.last_stopped.is_none());
        server.set_status(ServerStatus::Stopped);
        assert!(server.last_stopped.is_some());
    }
}
