//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here:
//! - `paths` - configuration root resolution and the on-disk layout
//! - `permissions` - Unix mode bits on persisted files
//! - `process` - PID liveness probing

pub mod paths;
pub mod permissions;
pub mod process;

pub use paths::{resolve_config_dir, StateLayout};
pub use permissions::set_file_mode;
pub use process::is_process_alive;
