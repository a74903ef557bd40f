//! Persisted entities.
//!
//! Each type here maps one-to-one onto a YAML document under the
//! configuration root and implements [`Validate`](crate::validation::Validate).

mod backup;
mod global;
mod server;
mod settings;
mod whitelist;

pub use backup::{BackupInfo, BackupRegistry};
pub use global::GlobalState;
pub use server::{
    ContainerInfo, DependencyType, MinecraftConfig, ModDependency, ModInfo, NewServer, OpInfo,
    ServerState, ServerStatus, VolumePaths,
};
pub use settings::{
    BackupSettings, Config, ContainerRuntime, ContainerSettings, LimitSettings, LogFormat,
    LogLevel, LoggingConfig, PortSettings, ServerDefaults,
};
pub use whitelist::{PlayerInfo, WhitelistState};

#[cfg(test)]
pub(crate) use backup::tests::sample_backup;
#[cfg(test)]
pub(crate) use server::tests::{sample_mod, sample_new_server};
