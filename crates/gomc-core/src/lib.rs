//! Persistence core for go-mc, a Minecraft server manager.
//!
//! Everything go-mc remembers lives as YAML documents under one configuration
//! root (`$GO_MC_CONFIG_DIR` or `~/.go-mc`):
//!
//! - [`storage`] writes files atomically, locks them, and quarantines
//!   documents that no longer parse
//! - [`process::PidLock`] keeps two full go-mc runs from overlapping
//! - [`store::StateStore`] hands out typed stores for servers, whitelists,
//!   configuration, the port pool and the backup catalogue
//!
//! ```no_run
//! use gomc_core::StateStore;
//!
//! # fn main() -> gomc_core::Result<()> {
//! let store = StateStore::from_env()?;
//! let _guard = store.acquire_pid_lock()?;
//! let port = store.global().allocate_next_port(25565)?;
//! println!("allocated {port}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod platform;
pub mod process;
pub mod storage;
pub mod store;
pub mod validation;

pub use error::{EntityKind, ErrorCategory, Result, StateError};
pub use logging::init_logging;
pub use platform::{resolve_config_dir, StateLayout};
pub use process::PidLock;
pub use storage::FileLock;
pub use store::{
    BackupRegistryStore, ConfigStore, GlobalStore, ServerStore, StateStore, WhitelistStore,
};
pub use validation::Validate;
