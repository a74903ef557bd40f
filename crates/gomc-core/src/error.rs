//! Error types for the go-mc state store.
//!
//! Every store operation reports through [`StateError`]. Variants map onto six
//! categories (see [`ErrorCategory`]) so that callers can render a precise
//! message or branch on the failure without string matching.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The kind of record an error refers to.
///
/// Carries the user-facing wording for "already there" and "not there" so the
/// phrasing stays consistent between the server, whitelist and pool stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Server,
    Whitelist,
    Port,
    Registration,
    Mod,
    Operator,
    Player,
    Backup,
    WhitelistReference,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Server => "server",
            EntityKind::Whitelist => "whitelist",
            EntityKind::Port => "port",
            EntityKind::Registration => "server",
            EntityKind::Mod => "mod",
            EntityKind::Operator => "operator",
            EntityKind::Player => "player",
            EntityKind::Backup => "backup",
            EntityKind::WhitelistReference => "whitelist",
        }
    }

    /// Phrase used when a record is added twice.
    pub fn exists_phrase(&self) -> &'static str {
        match self {
            EntityKind::Server | EntityKind::Whitelist | EntityKind::Backup => "already exists",
            EntityKind::Port => "is already allocated",
            EntityKind::Registration => "is already registered",
            EntityKind::Mod => "is already installed",
            EntityKind::Operator => "is already an operator",
            EntityKind::Player => "is already whitelisted",
            EntityKind::WhitelistReference => "is already attached",
        }
    }

    /// Phrase used when a required record is absent.
    pub fn missing_phrase(&self) -> &'static str {
        match self {
            EntityKind::Server | EntityKind::Whitelist | EntityKind::Backup => "does not exist",
            EntityKind::Port => "is not allocated",
            EntityKind::Registration => "is not registered",
            EntityKind::Mod => "is not installed",
            EntityKind::Operator => "is not an operator",
            EntityKind::Player => "is not whitelisted",
            EntityKind::WhitelistReference => "is not attached",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad classification of a [`StateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Corruption,
    LockContention,
    Io,
}

/// Main error type for the state store.
#[derive(Debug, Error)]
pub enum StateError {
    // Lookup errors
    #[error("{kind} '{key}' {}", .kind.missing_phrase())]
    NotFound { kind: EntityKind, key: String },

    #[error("{kind} '{key}' {}", .kind.exists_phrase())]
    AlreadyExists { kind: EntityKind, key: String },

    #[error("no free port between {start} and 65535")]
    PortsExhausted { start: u32 },

    // Validation errors
    #[error("invalid {field} '{value}': {reason}")]
    Validation {
        field: String,
        value: String,
        reason: String,
    },

    // Persisted data errors
    #[error("corrupted file {path:?} ({reason}); moved to {quarantined_to:?}")]
    Corrupted {
        path: PathBuf,
        quarantined_to: PathBuf,
        reason: String,
    },

    // Locking errors
    #[error("go-mc is already running (PID: {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("lock held on {path:?}")]
    LockHeld { path: PathBuf },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("YAML error: {message}")]
    Yaml {
        message: String,
        #[source]
        source: Option<serde_yaml_ng::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for state store operations.
pub type Result<T> = std::result::Result<T, StateError>;

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_yaml_ng::Error> for StateError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        StateError::Yaml {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl StateError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        StateError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a validation error for `field` with the offending value quoted.
    pub fn validation(
        field: impl Into<String>,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        StateError::Validation {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: EntityKind, key: impl fmt::Display) -> Self {
        StateError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn already_exists(kind: EntityKind, key: impl fmt::Display) -> Self {
        StateError::AlreadyExists {
            kind,
            key: key.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StateError::NotFound { .. } => ErrorCategory::NotFound,
            StateError::AlreadyExists { .. } | StateError::PortsExhausted { .. } => {
                ErrorCategory::Conflict
            }
            StateError::Validation { .. } | StateError::Config { .. } => ErrorCategory::Validation,
            StateError::Corrupted { .. } => ErrorCategory::Corruption,
            StateError::AlreadyRunning { .. } | StateError::LockHeld { .. } => {
                ErrorCategory::LockContention
            }
            StateError::Io { .. } | StateError::Yaml { .. } => ErrorCategory::Io,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }

    /// True for a non-blocking lock attempt that lost to another holder.
    ///
    /// Callers of `FileLock::try_lock` are expected to branch on this rather
    /// than treat it as a failure.
    pub fn is_lock_held(&self) -> bool {
        matches!(self, StateError::LockHeld { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StateError::already_exists(EntityKind::Mod, "sodium");
        assert_eq!(err.to_string(), "mod 'sodium' is already installed");

        let err = StateError::not_found(EntityKind::Registration, "lobby");
        assert_eq!(err.to_string(), "server 'lobby' is not registered");

        let err = StateError::AlreadyRunning { pid: 4242 };
        assert_eq!(err.to_string(), "go-mc is already running (PID: 4242)");
    }

    #[test]
    fn test_validation_quotes_value() {
        let err = StateError::validation("memory", "2 G", "must match ^[0-9]+[MGT]$");
        assert_eq!(
            err.to_string(),
            "invalid memory '2 G': must match ^[0-9]+[MGT]$"
        );
    }

    #[test]
    fn test_categories() {
        assert!(StateError::not_found(EntityKind::Server, "x").is_not_found());
        assert!(StateError::already_exists(EntityKind::Port, 25565).is_conflict());
        assert!(StateError::LockHeld {
            path: PathBuf::from("/tmp/x.lock")
        }
        .is_lock_held());
        assert_eq!(
            StateError::AlreadyRunning { pid: 1 }.category(),
            ErrorCategory::LockContention
        );
        let io: StateError = std::io::Error::other("boom").into();
        assert_eq!(io.category(), ErrorCategory::Io);
    }
}
