//! XDG Base Directory and application path resolution.
//!
//! Relies on `directories-next`. The application directories are plain
//! `<base>/zenway` subdirectories, so the configuration file lives at
//! `$XDG_CONFIG_HOME/zenway/config.toml`.
//!
//! All functions return [`CoreError::Config`] with
//! [`ConfigError::DirectoryUnavailable`] when the home directory cannot be found.

use crate::error::{ConfigError, CoreError};
use directories_next::BaseDirs;
use std::path::PathBuf;

const APPLICATION: &str = "zenway";

fn unavailable(dir_type: &str) -> CoreError {
    CoreError::Config(ConfigError::DirectoryUnavailable {
        dir_type: dir_type.to_string(),
    })
}

/// Returns `$XDG_CONFIG_HOME`, typically `~/.config`.
pub fn get_config_base_dir() -> Result<PathBuf, CoreError> {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| unavailable("Config Base"))
}

/// Returns `$XDG_STATE_HOME`, falling back to `~/.local/state`.
///
/// `BaseDirs` has no state directory accessor, so on non-Linux targets the local data
/// directory is used instead.
pub fn get_state_base_dir() -> Result<PathBuf, CoreError> {
    BaseDirs::new()
        .map(|dirs| {
            #[cfg(target_os = "linux")]
            {
                match std::env::var("XDG_STATE_HOME") {
                    Ok(state_home) if !state_home.is_empty() => PathBuf::from(state_home),
                    _ => dirs.home_dir().join(".local/state"),
                }
            }
            #[cfg(not(target_os = "linux"))]
            {
                dirs.data_local_dir().to_path_buf()
            }
        })
        .ok_or_else(|| unavailable("State Base"))
}

/// `~/.config/zenway` on Linux.
pub fn get_app_config_dir() -> Result<PathBuf, CoreError> {
    Ok(get_config_base_dir()?.join(APPLICATION))
}

/// `~/.local/state/zenway` on Linux. Relative log file paths are resolved here.
pub fn get_app_state_dir() -> Result<PathBuf, CoreError> {
    Ok(get_state_base_dir()?.join(APPLICATION))
}
