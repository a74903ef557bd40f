//! Crash-safe persistence primitives.
//!
//! - `atomic` - write-to-temp-then-rename file replacement
//! - `lock` - cooperative exclusive locks on arbitrary paths
//! - `document` - the YAML load / quarantine / save contract shared by stores

mod atomic;
mod document;
mod lock;

pub use atomic::{atomic_write, atomic_write_with_backup};
pub use document::{
    list_document_stems, quarantine, read_document, remove_document, write_document,
    write_document_with_backup,
};
pub use lock::{with_lock, FileLock};
