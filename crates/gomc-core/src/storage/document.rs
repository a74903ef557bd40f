//! YAML entity documents: load, validate, quarantine, save.
//!
//! The contract every store follows:
//! - an absent file is `Ok(None)`; the store decides between defaults and
//!   not-found
//! - bytes that do not deserialize are moved to `<path>.corrupted` and
//!   reported as [`StateError::Corrupted`]; they are never discarded
//! - a document that parses but breaks an invariant is a validation error and
//!   stays where it is
//! - saves validate first and go through [`atomic_write`]

use crate::config::{PathsConfig, StoreConfig};
use crate::error::{Result, StateError};
use crate::platform::paths::with_suffix;
use crate::storage::atomic::{atomic_write, atomic_write_with_backup};
use crate::validation::Validate;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read and validate a YAML document.
pub fn read_document<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned + Validate,
{
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            // Not UTF-8: as unreadable as a YAML syntax error.
            return Err(quarantine_with_reason(path, e.to_string()));
        }
        Err(e) => {
            return Err(StateError::Io {
                message: format!("Failed to read {}", path.display()),
                path: Some(path.to_path_buf()),
                source: Some(e),
            })
        }
    };

    let document: T = match serde_yaml_ng::from_str(&contents) {
        Ok(document) => document,
        Err(e) => return Err(quarantine_with_reason(path, e.to_string())),
    };

    document.validate()?;
    debug!("Loaded {}", path.display());
    Ok(Some(document))
}

/// Validate, serialize and atomically write a YAML document.
pub fn write_document<T>(path: &Path, document: &T) -> Result<()>
where
    T: Serialize + Validate,
{
    let serialized = serialize_document(path, document)?;
    atomic_write(path, serialized.as_bytes(), StoreConfig::FILE_MODE)
}

/// [`write_document`], keeping the previous contents as `<path>.bak`.
pub fn write_document_with_backup<T>(path: &Path, document: &T) -> Result<()>
where
    T: Serialize + Validate,
{
    let serialized = serialize_document(path, document)?;
    atomic_write_with_backup(path, serialized.as_bytes(), StoreConfig::FILE_MODE)
}

fn serialize_document<T>(path: &Path, document: &T) -> Result<String>
where
    T: Serialize + Validate,
{
    document.validate()?;
    serde_yaml_ng::to_string(document).map_err(|e| StateError::Yaml {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })
}

/// Remove a document. Returns `false` when there was nothing to remove.
pub fn remove_document(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StateError::Io {
            message: format!("Failed to remove {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        }),
    }
}

/// Move `path` aside to `<path>.corrupted`.
///
/// An earlier quarantine at that name is first renamed to
/// `<path>.corrupted.<UTC timestamp>`, so no corrupted bytes are ever
/// overwritten.
pub fn quarantine(path: &Path) -> Result<PathBuf> {
    let target = with_suffix(path, PathsConfig::CORRUPTED_SUFFIX);
    if target.exists() {
        let rotated = rotation_target(&target);
        fs::rename(&target, &rotated).map_err(|e| StateError::Io {
            message: format!(
                "Failed to rotate earlier quarantine {} to {}",
                target.display(),
                rotated.display()
            ),
            path: Some(target.clone()),
            source: Some(e),
        })?;
        debug!(
            "Rotated earlier quarantine {} to {}",
            target.display(),
            rotated.display()
        );
    }
    fs::rename(path, &target).map_err(|e| StateError::Io {
        message: format!(
            "Failed to quarantine {} to {}",
            path.display(),
            target.display()
        ),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;
    warn!(
        "Quarantined corrupted file {} to {}",
        path.display(),
        target.display()
    );
    Ok(target)
}

/// A free `<target>.<timestamp>[-n]` name next to `target`.
fn rotation_target(target: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
    let mut candidate = with_suffix(target, &format!(".{stamp}"));
    let mut attempt = 1u32;
    while candidate.exists() {
        candidate = with_suffix(target, &format!(".{stamp}-{attempt}"));
        attempt += 1;
    }
    candidate
}

fn quarantine_with_reason(path: &Path, reason: String) -> StateError {
    match quarantine(path) {
        Ok(quarantined_to) => StateError::Corrupted {
            path: path.to_path_buf(),
            quarantined_to,
            reason,
        },
        // Could not move it aside; still refuse to use it.
        Err(e) => e,
    }
}

/// Stems of `*.yaml` documents in `dir`, sorted.
///
/// Quarantined, backup, temp and other non-document files are skipped, as is
/// anything `accept` rejects.
pub fn list_document_stems(dir: &Path, accept: impl Fn(&str) -> bool) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StateError::io_with_path(e, dir)),
    };

    let mut stems = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StateError::io_with_path(e, dir))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if ext != PathsConfig::DOCUMENT_EXTENSION {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if accept(stem) {
            stems.push(stem.to_string());
        } else {
            debug!("Skipping {} in {}", stem, dir.display());
        }
    }
    stems.sort();
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    impl Validate for Sample {
        fn validate(&self) -> Result<()> {
            if self.count > 10 {
                return Err(StateError::validation("count", self.count, "too big"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.yaml");
        let sample = Sample {
            name: "a".into(),
            count: 3,
        };

        write_document(&path, &sample).unwrap();
        let loaded: Option<Sample> = read_document(&path).unwrap();
        assert_eq!(loaded, Some(sample));
    }

    #[test]
    fn test_read_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let loaded: Option<Sample> = read_document(&temp_dir.path().join("nope.yaml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_unparsable_is_quarantined() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.yaml");
        fs::write(&path, "name: [unclosed\n").unwrap();

        let quarantined_to = match read_document::<Sample>(&path) {
            Err(StateError::Corrupted { quarantined_to, .. }) => quarantined_to,
            other => panic!("expected corruption, got {other:?}"),
        };
        assert!(!path.exists());
        assert_eq!(quarantined_to, temp_dir.path().join("sample.yaml.corrupted"));
        assert_eq!(fs::read_to_string(quarantined_to).unwrap(), "name: [unclosed\n");
    }

    #[test]
    fn test_repeated_quarantine_keeps_every_generation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("foo.yaml");

        fs::write(&path, "first: [\n").unwrap();
        assert!(matches!(
            read_document::<Sample>(&path),
            Err(StateError::Corrupted { .. })
        ));
        fs::write(&path, "second: [\n").unwrap();
        assert!(matches!(
            read_document::<Sample>(&path),
            Err(StateError::Corrupted { .. })
        ));

        let latest = temp_dir.path().join("foo.yaml.corrupted");
        assert_eq!(fs::read_to_string(&latest).unwrap(), "second: [\n");

        let rotated: Vec<PathBuf> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("foo.yaml.corrupted."))
            })
            .collect();
        assert_eq!(rotated.len(), 1);
        assert_eq!(fs::read_to_string(&rotated[0]).unwrap(), "first: [\n");
        assert!(!path.exists());
    }

    #[test]
    fn test_rotation_target_avoids_existing_names() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("foo.yaml.corrupted");
        let first = rotation_target(&target);
        fs::write(&first, "x").unwrap();
        let second = rotation_target(&target);
        assert_ne!(first, second);
        assert!(!second.exists());
    }

    #[test]
    fn test_invalid_but_parseable_is_not_quarantined() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.yaml");
        fs::write(&path, "name: a\ncount: 99\n").unwrap();

        let err = read_document::<Sample>(&path).unwrap_err();
        assert!(matches!(err, StateError::Validation { .. }));
        assert!(path.exists());
    }

    #[test]
    fn test_write_refuses_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.yaml");
        let sample = Sample {
            name: "a".into(),
            count: 11,
        };
        assert!(write_document(&path, &sample).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_list_document_stems_skips_sidecars() {
        let temp_dir = TempDir::new().unwrap();
        for name in [
            "b.yaml",
            "a.yaml",
            "c.yaml.corrupted",
            "d.yaml.bak",
            ".e.yaml.abc.tmp",
            "notes.txt",
            "Bad_Name.yaml",
        ] {
            fs::write(temp_dir.path().join(name), "x").unwrap();
        }

        let stems = list_document_stems(temp_dir.path(), |s| !s.contains('_')).unwrap();
        assert_eq!(stems, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_remove_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.yaml");
        fs::write(&path, "x").unwrap();
        assert!(remove_document(&path).unwrap());
        assert!(!remove_document(&path).unwrap());
    }
}
