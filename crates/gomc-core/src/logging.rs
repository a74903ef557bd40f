//! Tracing subscriber setup driven by the `logging` section of `config.yaml`.

use crate::error::{Result, StateError};
use crate::models::{LogFormat, LogLevel, LoggingConfig};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Environment variable that overrides the configured level.
pub const LOG_ENV: &str = "RUST_LOG";

/// Install the global subscriber.
///
/// Logs go to stderr, or are appended to `config.file` when set. `RUST_LOG`
/// takes precedence over `config.level`. Fails if a subscriber is already
/// installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = EnvFilter::try_new(filter_directive(config.level, env_value.as_deref()))
        .or_else(|_| EnvFilter::try_new(config.level.as_str()))
        .map_err(|e| StateError::Config {
            message: format!("Invalid log filter: {e}"),
        })?;

    let (writer, ansi) = match &config.file {
        Some(file) => (BoxMakeWriter::new(Mutex::new(open_log_file(Path::new(file))?)), false),
        None => (BoxMakeWriter::new(io::stderr), true),
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| StateError::Config {
            message: format!("Failed to initialize logging: {e}"),
        })?;

    tracing::debug!(level = %config.level, "Logging initialized");
    Ok(())
}

/// The filter directive in effect: a non-empty `RUST_LOG` wins over the
/// configured level.
pub fn filter_directive(level: LogLevel, env_value: Option<&str>) -> String {
    match env_value.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => level.as_str().to_string(),
    }
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StateError::io_with_path(e, parent))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StateError::Io {
            message: format!("Failed to open log file {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_directive_prefers_env() {
        assert_eq!(filter_directive(LogLevel::Info, None), "info");
        assert_eq!(filter_directive(LogLevel::Warn, Some("")), "warn");
        assert_eq!(filter_directive(LogLevel::Warn, Some("  ")), "warn");
        assert_eq!(
            filter_directive(LogLevel::Info, Some("gomc_core=trace")),
            "gomc_core=trace"
        );
    }

    #[test]
    fn test_open_log_file_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("go-mc.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
