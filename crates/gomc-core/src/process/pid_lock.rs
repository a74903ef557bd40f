//! Process-wide singleton lock backed by a PID file.
//!
//! ## Algorithm
//!
//! 1. Open (or create) the PID file and take an exclusive non-blocking
//!    `fs2` lock on it. Losing this race means another instance holds it:
//!    fail with the PID recorded in the file. Winning it on a file that a
//!    releasing instance has meanwhile unlinked means starting over.
//! 2. With the lock held, read the recorded PID. If it names a live process
//!    (one that does not hold the lock, e.g. a build without locking), fail
//!    with "already running".
//! 3. Empty, unparsable, zero or dead PIDs are stale: log and reclaim.
//! 4. Truncate, write our PID, fsync.
//! 5. On release: delete the file, then unlock.
//!
//! The file content is diagnostic; the OS lock is what enforces exclusion.

use crate::config::StoreConfig;
use crate::error::{Result, StateError};
use crate::platform::{is_process_alive, set_file_mode};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RELINK_ATTEMPTS: u32 = 3;

/// Exclusive ownership of the go-mc PID file.
///
/// Held for the life of the process; dropping it releases the lock and
/// removes the file.
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
    pid: u32,
    file: Option<File>,
}

impl PidLock {
    /// Acquire the singleton lock at `path`.
    ///
    /// # Errors
    ///
    /// * [`StateError::AlreadyRunning`] when another live instance owns it.
    /// * [`StateError::Io`] on filesystem failures.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let own_pid = std::process::id();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StateError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let mut file = Self::open_locked(&path)?;

        // From here on `file` is locked; returning drops it, which unlocks.
        let recorded = read_pid_from(&mut file).map_err(|e| StateError::io_with_path(e, &path))?;
        match recorded {
            Some(pid) if pid != own_pid && is_process_alive(pid) => {
                return Err(StateError::AlreadyRunning { pid });
            }
            Some(pid) => {
                warn!(
                    "Reclaiming stale PID file {} (PID {} no longer holds it)",
                    path.display(),
                    pid
                );
            }
            None if file_len(&file) > 0 => {
                warn!(
                    "Reclaiming stale PID file {} (unreadable contents)",
                    path.display()
                );
            }
            None => {}
        }

        write_pid_to(&mut file, own_pid).map_err(|e| StateError::Io {
            message: format!("Failed to write PID file {}", path.display()),
            path: Some(path.clone()),
            source: Some(e),
        })?;
        set_file_mode(&file, &path, StoreConfig::PID_FILE_MODE)?;

        info!(path = %path.display(), pid = own_pid, "PID lock acquired");
        Ok(Self {
            path,
            pid: own_pid,
            file: Some(file),
        })
    }

    /// Open `path` and take its lock, retrying when the locked handle turns
    /// out to be a file a releasing instance has already unlinked.
    fn open_locked(path: &Path) -> Result<File> {
        for attempt in 1..=RELINK_ATTEMPTS {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| StateError::Io {
                    message: format!("Failed to open PID file {}", path.display()),
                    path: Some(path.to_path_buf()),
                    source: Some(e),
                })?;

            if let Err(e) = file.try_lock_exclusive() {
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
                {
                    let pid = Self::read_pid(path).unwrap_or(0);
                    return Err(StateError::AlreadyRunning { pid });
                }
                return Err(StateError::io_with_path(e, path));
            }

            if still_linked(&file, path) {
                return Ok(file);
            }
            debug!(
                "PID file {} was replaced while locking (attempt {})",
                path.display(),
                attempt
            );
        }

        Err(StateError::Io {
            message: format!("PID file {} kept being replaced while locking", path.display()),
            path: Some(path.to_path_buf()),
            source: None,
        })
    }

    /// Unlock, close and delete the PID file. A second call is a no-op.
    pub fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        // Delete while still holding the lock so no one can lock the old
        // file between our unlock and unlink.
        let removed = match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::io_with_path(e, &self.path)),
        };

        if let Err(e) = FileExt::unlock(&file) {
            debug!("Unlock of {} failed: {}", self.path.display(), e);
        }
        drop(file);

        removed?;
        info!(path = %self.path.display(), pid = self.pid, "PID lock released");
        Ok(())
    }

    /// The PID recorded in a PID file, if it holds one.
    pub fn read_pid(path: &Path) -> Option<u32> {
        let mut file = File::open(path).ok()?;
        read_pid_from(&mut file).ok().flatten()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release PID lock {}: {}", self.path.display(), e);
        }
    }
}

/// Whether `file` is still the file linked at `path`.
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(linked)) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        _ => false,
    }
}

// Windows refuses to delete a file that is open, so the handle cannot
// outlive its directory entry.
#[cfg(not(unix))]
fn still_linked(_file: &File, _path: &Path) -> bool {
    true
}

/// Parse the file's PID. `None` for empty, non-numeric or zero content.
fn read_pid_from(file: &mut File) -> io::Result<Option<u32>> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    if let Err(e) = file.read_to_string(&mut contents) {
        if e.kind() == io::ErrorKind::InvalidData {
            return Ok(None);
        }
        return Err(e);
    }
    Ok(contents.trim().parse::<u32>().ok().filter(|pid| *pid != 0))
}

fn write_pid_to(file: &mut File, pid: u32) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{pid}")?;
    file.flush()?;
    file.sync_all()
}

fn file_len(file: &File) -> u64 {
    file.metadata().map(|m| m.len()).unwrap_or(0)
}
