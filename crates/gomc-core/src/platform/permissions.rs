//! File permission handling for persisted documents.

use crate::error::{Result, StateError};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Apply Unix permission bits to an open file.
///
/// # Platform Behavior
/// - **Linux/macOS**: Sets `mode` via `fchmod` on the handle
/// - **Windows**: No-op (ACLs govern access; there are no mode bits)
///
/// Works on the handle so a temp file can be fixed up before it is renamed
/// into place.
pub fn set_file_mode(file: &File, path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(|e| StateError::io_with_path(e, path))?;
        debug!("Set mode {:o} on: {}", mode, path.display());
    }

    #[cfg(not(unix))]
    {
        let _ = (file, mode);
        debug!("Skipping mode bits on this platform for: {}", path.display());
    }

    Ok(())
}
