//! Process lifecycle.
//!
//! The CLI entry point takes the [`PidLock`] once at startup so that two full
//! go-mc runs never overlap. Store operations do not assume it is held.

mod pid_lock;

pub use pid_lock::PidLock;
