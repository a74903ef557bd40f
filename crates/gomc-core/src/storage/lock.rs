//! Cooperative exclusive file locks.
//!
//! Wraps `fs2` (flock on Unix, LockFileEx on Windows). The lock only binds
//! processes that also take it; it says nothing about the file's contents, so
//! pair it with [`atomic_write`](super::atomic_write) for crash safety.

use crate::error::{Result, StateError};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An exclusive advisory lock held on an open file handle.
///
/// Released by [`unlock`](Self::unlock) or on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Option<File>,
}

impl FileLock {
    /// Open (creating if needed) and lock `path`, waiting for any holder.
    pub fn lock(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = open_lock_file(&path)?;
        file.lock_exclusive()
            .map_err(|e| StateError::io_with_path(e, &path))?;
        debug!("Acquired lock {}", path.display());
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Open (creating if needed) and lock `path` without waiting.
    ///
    /// Returns [`StateError::LockHeld`] when another handle owns the lock.
    pub fn try_lock(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = open_lock_file(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired lock {}", path.display());
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if is_contended(&e) => {
                debug!("Lock {} is held elsewhere", path.display());
                Err(StateError::LockHeld { path })
            }
            Err(e) => Err(StateError::io_with_path(e, &path)),
        }
    }

    /// Release and close. A second call is a no-op.
    pub fn unlock(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        FileExt::unlock(&file).map_err(|e| StateError::io_with_path(e, &self.path))?;
        debug!("Released lock {}", self.path.display());
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

/// Run `f` while holding a blocking lock on `lock_path`.
///
/// The closure's result is returned as-is; a failed unlock is only logged.
pub fn with_lock<T>(lock_path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let mut lock = FileLock::lock(lock_path)?;
    let result = f();
    if let Err(e) = lock.unlock() {
        warn!("Failed to release lock {}: {}", lock_path.display(), e);
    }
    result
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| StateError::Io {
                message: format!("Failed to create lock directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StateError::Io {
            message: format!("Failed to open lock file {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_try_lock_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.yaml.lock");

        let mut first = FileLock::try_lock(&path).unwrap();
        let second = FileLock::try_lock(&path);
        assert!(matches!(second, Err(ref e) if e.is_lock_held()));

        first.unlock().unwrap();
        let third = FileLock::try_lock(&path).unwrap();
        assert!(third.is_locked());
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut lock = FileLock::lock(temp_dir.path().join("x.lock")).unwrap();
        lock.unlock().unwrap();
        lock.unlock().unwrap();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_drop_releases() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.lock");
        {
            let _held = FileLock::try_lock(&path).unwrap();
        }
        assert!(FileLock::try_lock(&path).is_ok());
    }

    #[test]
    fn test_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locks").join("nested").join("x.lock");
        let lock = FileLock::lock(&path).unwrap();
        assert!(path.exists());
        assert_eq!(lock.path(), path.as_path());
    }

    #[test]
    fn test_blocking_lock_waits_for_holder() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.lock");
        let holder = FileLock::lock(&path).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter_path = path.clone();
        let waiter = thread::spawn(move || {
            let _lock = FileLock::lock(&waiter_path).unwrap();
            tx.send(()).unwrap();
        });

        // Still blocked while the holder is alive.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(holder);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_with_lock_returns_closure_result() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.lock");
        let value = with_lock(&path, || {
            assert!(FileLock::try_lock(&path).is_err());
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7);
        assert!(FileLock::try_lock(&path).is_ok());
    }

    #[test]
    fn test_with_lock_passes_closure_error_through_and_releases() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.lock");
        let result: Result<()> = with_lock(&path, || {
            Err(StateError::validation("port", "70000", "out of range"))
        });
        assert!(matches!(result, Err(StateError::Validation { .. })));
        assert!(FileLock::try_lock(&path).is_ok());
    }
}
