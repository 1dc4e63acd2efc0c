//! Logging bootstrap for zenway.
//!
//! Everything in the workspace logs through `tracing`. This module installs the
//! global subscriber: a console layer on stdout and, when
//! [`LoggingConfig::file_path`] is set, a daily rolling file layer written through a
//! non-blocking `tracing_appender` worker.

use crate::config::LoggingConfig;
use crate::error::{CoreError, LoggingError};
use crate::utils;

use once_cell::sync::Lazy;
use std::io::stdout;
use std::path::Path;
use std::sync::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps the file writer alive so buffered lines are flushed on exit.
static LOG_WORKER_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

fn minimal_subscriber() -> impl Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .finish()
}

/// Installs a stderr subscriber filtered by `RUST_LOG` (default "info").
///
/// Used as a fallback when [`init_logging`] fails. Errors from an already installed
/// subscriber are ignored.
pub fn init_minimal_logging() {
    let _ = minimal_subscriber().try_init();
}

/// Routes this thread's events to the minimal stderr subscriber until the returned
/// guard is dropped.
///
/// Covers startup before the configuration is loaded without claiming the global
/// subscriber, so [`init_logging`] can still install the configured one afterwards.
pub fn scoped_minimal_logging() -> DefaultGuard {
    tracing::subscriber::set_default(minimal_subscriber())
}

fn parse_level(level: &str) -> Result<Level, CoreError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        invalid_level => Err(CoreError::Logging(LoggingError::InitializationFailure(format!(
            "Invalid log level in config: {}",
            invalid_level
        )))),
    }
}

fn create_file_layer(log_path: &Path, format: &str) -> Result<(BoxedLayer, WorkerGuard), CoreError> {
    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    utils::fs::ensure_dir_exists(directory)?;

    let file_name = log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("zenway.log"));
    let file_appender = tracing_appender::rolling::daily(directory, file_name);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let layer = match format.to_lowercase().as_str() {
        "json" => fmt::layer()
            .json()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .boxed(),
        _ => fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .boxed(),
    };
    Ok((layer, guard))
}

/// Installs the global subscriber described by `config`.
///
/// With `is_reload` set, a subscriber that is already installed is not an error; the
/// previous one stays active along with its file writer. The file guard is only
/// replaced once the new subscriber is installed.
///
/// # Errors
///
/// [`LoggingError::InitializationFailure`] for an invalid level, or when a subscriber
/// is already installed and `is_reload` is false.
pub fn init_logging(config: &LoggingConfig, is_reload: bool) -> Result<(), CoreError> {
    let level = parse_level(&config.level)?;

    let stdout_layer = match config.format.to_lowercase().as_str() {
        "json" => fmt::layer()
            .json()
            .with_writer(stdout)
            .with_ansi(false)
            .with_filter(EnvFilter::new(level.to_string()))
            .boxed(),
        _ => fmt::layer()
            .with_writer(stdout)
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_filter(EnvFilter::new(level.to_string()))
            .boxed(),
    };

    let mut layers: Vec<BoxedLayer> = vec![stdout_layer];
    let mut new_file_guard = None;
    if let Some(log_path) = &config.file_path {
        let (file_layer, guard) = create_file_layer(log_path, &config.format)?;
        layers.push(file_layer.with_filter(EnvFilter::new(level.to_string())).boxed());
        new_file_guard = Some(guard);
    }

    match Registry::default().with(layers).try_init() {
        Ok(()) => {
            match LOG_WORKER_GUARD.lock() {
                Ok(mut guard_slot) => *guard_slot = new_file_guard,
                Err(e) => eprintln!(
                    "[ERROR] Failed to lock LOG_WORKER_GUARD: {}. Log flushing may be affected.",
                    e
                ),
            }
            Ok(())
        }
        Err(e) if is_reload => {
            eprintln!("[INFO] Logging reload attempted, previous subscriber persists: {}", e);
            Ok(())
        }
        Err(e) => Err(CoreError::Logging(LoggingError::InitializationFailure(format!(
            "Failed to set global tracing subscriber. Was it already initialized? Error: {}",
            e
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_minimal_logging_runs_twice() {
        init_minimal_logging();
        init_minimal_logging();
        tracing::info!("minimal logging installed");
    }

    #[test]
    fn test_create_file_layer_creates_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested/dir/zenway.log");
        assert!(!nested.parent().unwrap().exists());

        let result = create_file_layer(&nested, "text");
        assert!(result.is_ok(), "create_file_layer failed: {:?}", result.err());
        assert!(nested.parent().unwrap().is_dir());
    }

    #[test]
    fn test_create_file_layer_json_format() {
        let temp_dir = TempDir::new().unwrap();
        let (_layer, _guard) = create_file_layer(&temp_dir.path().join("z.log"), "json").unwrap();
    }

    #[test]
    fn test_init_logging_invalid_level_returns_error() {
        let config = LoggingConfig {
            level: "supertrace".to_string(),
            file_path: None,
            format: "text".to_string(),
        };
        match init_logging(&config, false) {
            Err(CoreError::Logging(LoggingError::InitializationFailure(msg))) => {
                assert!(msg.contains("Invalid log level in config: supertrace"));
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_init_logging_reload_never_errors() {
        init_minimal_logging();
        let temp_dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            file_path: Some(temp_dir.path().join("reload.log")),
            format: "json".to_string(),
        };
        assert!(init_logging(&config, true).is_ok());
        assert!(LOG_WORKER_GUARD.lock().unwrap().is_none());

        let console_only = LoggingConfig {
            file_path: None,
            ..config
        };
        assert!(init_logging(&console_only, true).is_ok());
    }

    #[test]
    fn test_failed_init_keeps_previous_file_guard() {
        init_minimal_logging();
        let temp_dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            level: "info".to_string(),
            file_path: Some(temp_dir.path().join("rejected.log")),
            format: "text".to_string(),
        };
        assert!(init_logging(&config, false).is_err());
        assert!(LOG_WORKER_GUARD.lock().unwrap().is_none());
    }

    #[test]
    fn test_scoped_minimal_logging_is_released_on_drop() {
        let guard = scoped_minimal_logging();
        tracing::info!("scoped logging active");
        drop(guard);
        tracing::info!("scoped logging released");
    }
}
