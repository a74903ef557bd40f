//! Atomic file replacement.
//!
//! Implements atomic writes using:
//! 1. Write to a uniquely named temp file in the target's own directory
//! 2. fsync to ensure data reaches disk
//! 3. Apply permissions
//! 4. Optional `.bak` copy of the previous generation
//! 5. Atomic rename onto the target
//!
//! A reader therefore sees either the old bytes or the new bytes, never a
//! mix. Any failure before step 5 drops the temp file and leaves the target
//! untouched. Nothing is retried here; the caller decides.

use crate::config::PathsConfig;
use crate::error::{Result, StateError};
use crate::platform::paths::with_suffix;
use crate::platform::set_file_mode;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Replace `path` with `data` atomically, creating parent directories.
pub fn atomic_write(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    write_atomically(path, data, mode, false, |_| Ok(()))
}

/// Like [`atomic_write`], but first preserves the current contents of `path`
/// as `path.bak`.
///
/// The previous generation is copied rather than moved, so `path` stays
/// readable for the whole operation. A failed backup is logged and the write
/// goes ahead.
pub fn atomic_write_with_backup(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    write_atomically(path, data, mode, true, |_| Ok(()))
}

fn write_atomically<F>(
    path: &Path,
    data: &[u8],
    mode: u32,
    keep_backup: bool,
    before_rename: F,
) -> Result<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    let file_name = path.file_name().ok_or_else(|| StateError::Io {
        message: format!("Cannot write to {}: no file name", path.display()),
        path: Some(path.to_path_buf()),
        source: None,
    })?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    if !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| StateError::Io {
            message: format!("Failed to create directory {}", parent.display()),
            path: Some(parent.to_path_buf()),
            source: Some(e),
        })?;
    }

    // Same directory as the target: rename is only atomic within one filesystem.
    let prefix = format!(".{}.", file_name.to_string_lossy());
    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(PathsConfig::TEMP_SUFFIX)
        .tempfile_in(parent)
        .map_err(|e| StateError::Io {
            message: format!("Failed to create temp file in {}", parent.display()),
            path: Some(parent.to_path_buf()),
            source: Some(e),
        })?;

    temp.write_all(data).map_err(|e| StateError::Io {
        message: format!("Failed to write temp file {}", temp.path().display()),
        path: Some(temp.path().to_path_buf()),
        source: Some(e),
    })?;

    temp.flush().map_err(|e| StateError::Io {
        message: format!("Failed to flush temp file {}", temp.path().display()),
        path: Some(temp.path().to_path_buf()),
        source: Some(e),
    })?;

    temp.as_file().sync_all().map_err(|e| StateError::Io {
        message: format!("Failed to sync temp file {}", temp.path().display()),
        path: Some(temp.path().to_path_buf()),
        source: Some(e),
    })?;

    set_file_mode(temp.as_file(), temp.path(), mode)?;

    if keep_backup && path.exists() {
        let backup_path = with_suffix(path, PathsConfig::BACKUP_SUFFIX);
        if let Err(e) = fs::copy(path, &backup_path) {
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    before_rename(temp.path()).map_err(|e| StateError::Io {
        message: format!("Aborted before renaming {}", temp.path().display()),
        path: Some(temp.path().to_path_buf()),
        source: Some(e),
    })?;

    // On failure the PersistError hands the temp file back and dropping it
    // removes it from disk.
    temp.persist(path).map_err(|e| StateError::Io {
        message: format!(
            "Failed to rename {} to {}",
            e.file.path().display(),
            path.display()
        ),
        path: Some(path.to_path_buf()),
        source: Some(e.error),
    })?;

    sync_dir(parent);

    debug!("Atomically wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Flush the directory entry for a completed rename. Best effort.
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
            debug!("Failed to sync directory {}: {}", dir.display(), e);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}
