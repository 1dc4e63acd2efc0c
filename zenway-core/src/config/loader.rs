//! Configuration Loading for zenway.
//!
//! [`ConfigLoader`] locates the configuration file, deserializes it from TOML, applies
//! defaults and validates the result.
//!
//! ```rust,ignore
//! use zenway_core::config::ConfigLoader;
//!
//! match ConfigLoader::load(None) {
//!     Ok(config) => println!("Buffers: {}", config.buffers.count),
//!     Err(e) => {
//!         zenway_core::logging::init_minimal_logging();
//!         tracing::error!("Configuration loading failed: {}", e);
//!     }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ZenwayConfig, MAX_BUFFER_COUNT};
use crate::error::{ConfigError, CoreError};
use crate::utils::fs as zen_fs;
use crate::utils::paths::{get_app_config_dir, get_app_state_dir};

/// Name of the configuration file inside the application config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Static entry points for loading and validating [`ZenwayConfig`].
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates the configuration.
    ///
    /// With `explicit` set the file must exist; a missing file is reported as
    /// [`ConfigError::NotFound`]. Without it, `config.toml` in the application config
    /// directory is read if present and built-in defaults are used otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<ZenwayConfig, CoreError> {
        let mut config = match explicit {
            Some(path) => match Self::read(path)? {
                Some(config) => config,
                None => {
                    return Err(CoreError::Config(ConfigError::NotFound {
                        locations: vec![path.to_path_buf()],
                    }))
                }
            },
            None => {
                let user_config_path = get_app_config_dir()?.join(CONFIG_FILE_NAME);
                match Self::read(&user_config_path)? {
                    Some(config) => config,
                    None => {
                        tracing::info!(
                            "No configuration at {:?}, using defaults",
                            user_config_path
                        );
                        ZenwayConfig::default()
                    }
                }
            }
        };
        Self::validate_config(&mut config)?;
        Ok(config)
    }

    /// Parses a configuration from a TOML string and validates it.
    pub fn load_from_str(content: &str) -> Result<ZenwayConfig, CoreError> {
        let mut config: ZenwayConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Self::validate_config(&mut config)?;
        Ok(config)
    }

    /// Returns `Ok(None)` when the file does not exist. An empty file yields defaults.
    fn read(path: &Path) -> Result<Option<ZenwayConfig>, CoreError> {
        match fs::read_to_string(path) {
            Ok(content) => {
                tracing::info!("Loading configuration at {:?}", path);
                if content.trim().is_empty() {
                    return Ok(Some(ZenwayConfig::default()));
                }
                let config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::Config(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })),
        }
    }

    /// Validates the configuration and normalizes it in place.
    ///
    /// - log level and format are lowercased and checked;
    /// - a relative log file path is resolved against the state directory and its
    ///   parent directory is created;
    /// - the buffer pool must hold between 1 and [`MAX_BUFFER_COUNT`] non-empty buffers;
    /// - polling intervals must be non-zero, panel names unique, colors well formed.
    pub fn validate_config(config: &mut ZenwayConfig) -> Result<(), CoreError> {
        let level_lower = config.logging.level.to_lowercase();
        match level_lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => config.logging.level = level_lower,
            _ => {
                return Err(validation(format!(
                    "Invalid log level: '{}'. Must be one of trace, debug, info, warn, error.",
                    config.logging.level
                )))
            }
        }

        let format_lower = config.logging.format.to_lowercase();
        match format_lower.as_str() {
            "text" | "json" => config.logging.format = format_lower,
            _ => {
                return Err(validation(format!(
                    "Invalid log format: '{}'. Must be one of text, json.",
                    config.logging.format
                )))
            }
        }

        if let Some(file_path) = &config.logging.file_path {
            let absolute_path: PathBuf = if file_path.is_absolute() {
                file_path.clone()
            } else {
                get_app_state_dir()?.join(file_path)
            };
            if let Some(parent_dir) = absolute_path.parent() {
                if !parent_dir.exists() {
                    zen_fs::ensure_dir_exists(parent_dir)?;
                }
            }
            config.logging.file_path = Some(absolute_path);
        }

        let buffers = &config.buffers;
        if buffers.count == 0 || buffers.count > MAX_BUFFER_COUNT {
            return Err(validation(format!(
                "Invalid buffer count: {}. Must be between 1 and {}.",
                buffers.count, MAX_BUFFER_COUNT
            )));
        }
        if buffers.width == 0 || buffers.height == 0 {
            return Err(validation(format!(
                "Invalid buffer size: {}x{}.",
                buffers.width, buffers.height
            )));
        }

        if config.power.poll_interval_secs == 0 || config.network.poll_interval_secs == 0 {
            return Err(validation("Polling intervals must be at least one second.".to_string()));
        }
        if config.power.alert_threshold > 100 {
            return Err(validation(format!(
                "Invalid alert threshold: {}%.",
                config.power.alert_threshold
            )));
        }

        let mut names = std::collections::HashSet::new();
        for panel in &config.panels {
            if !names.insert(panel.name.as_str()) {
                return Err(validation(format!("Duplicate panel name: '{}'.", panel.name)));
            }
            check_color(&panel.color)?;
        }
        check_color(&config.alert_panel.color)?;

        Ok(())
    }
}

fn check_color(color: &str) -> Result<(), CoreError> {
    match super::parse_argb(color) {
        Some(_) => Ok(()),
        None => Err(validation(format!(
            "Invalid color: '{}'. Expected #rrggbb or #rrggbbaa.",
            color
        ))),
    }
}

fn validation(message: String) -> CoreError {
    CoreError::Config(ConfigError::ValidationError(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [logging]
            level = "DEBUG"

            [buffers]
            count = 1
            width = 800
            height = 32
            "#
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.buffers.count, 1);
        assert_eq!(config.buffers.width, 800);
    }

    #[test]
    fn test_load_explicit_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        match ConfigLoader::load(Some(&path)) {
            Err(CoreError::Config(ConfigError::NotFound { locations })) => {
                assert_eq!(locations, vec![path]);
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config, ZenwayConfig::default());
    }

    #[test]
    fn test_load_invalid_toml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[buffers\ncount = 2").unwrap();
        assert!(matches!(
            ConfigLoader::load(Some(file.path())),
            Err(CoreError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_absolute_log_path_parent_is_created() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("logs/zenway.log");
        let content = format!("[logging]\nfile_path = {:?}\n", log_path.to_str().unwrap());
        let config = ConfigLoader::load_from_str(&content).unwrap();
        assert_eq!(config.logging.file_path, Some(log_path.clone()));
        assert!(log_path.parent().unwrap().is_dir());
    }

    #[rstest]
    #[case::zero_buffers("[buffers]\ncount = 0\n")]
    #[case::too_many_buffers("[buffers]\ncount = 4\n")]
    #[case::zero_width("[buffers]\nwidth = 0\n")]
    #[case::bad_level("[logging]\nlevel = \"loud\"\n")]
    #[case::bad_format("[logging]\nformat = \"xml\"\n")]
    #[case::zero_interval("[power]\npoll_interval_secs = 0\n")]
    #[case::threshold("[power]\nalert_threshold = 101\n")]
    #[case::bad_color("[alert_panel]\ncolor = \"red\"\n")]
    #[case::duplicate_panel("[[panels]]\nname = \"a\"\n[[panels]]\nname = \"a\"\n")]
    fn test_validation_rejects(#[case] content: &str) {
        assert!(matches!(
            ConfigLoader::load_from_str(content),
            Err(CoreError::Config(ConfigError::ValidationError(_)))
        ));
    }

    #[rstest]
    #[case("[buffers]\ncount = 1\n")]
    #[case("[buffers]\ncount = 3\n")]
    #[case("[logging]\nformat = \"JSON\"\n")]
    fn test_validation_accepts(#[case] content: &str) {
        assert!(ConfigLoader::load_from_str(content).is_ok());
    }
}
