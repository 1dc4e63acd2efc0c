//! Default configuration values for zenway.
//!
//! These functions are used by `serde`'s `default` attribute in the configuration
//! structures when a value is not present in the configuration file.

use crate::config::{
    AlertPanelConfig, BufferConfig, ClockConfig, LoggingConfig, NetworkConfig, PanelConfig,
    PowerConfig,
};
use std::path::PathBuf;

pub(crate) fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        file_path: default_log_file_path(),
        format: default_log_format(),
    }
}

/// Returns the default log level string (`"info"`).
pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

/// Returns the default log file path (`None`, console only).
pub(crate) fn default_log_file_path() -> Option<PathBuf> {
    None
}

/// Returns the default log format string (`"text"`).
pub(crate) fn default_log_format() -> String {
    "text".to_string()
}

pub(crate) fn default_buffer_config() -> BufferConfig {
    BufferConfig {
        count: default_buffer_count(),
        width: default_buffer_width(),
        height: default_buffer_height(),
    }
}

/// Two buffers: one held by the compositor while the next frame is prepared.
pub(crate) fn default_buffer_count() -> usize {
    2
}

pub(crate) fn default_buffer_width() -> u32 {
    1920
}

pub(crate) fn default_buffer_height() -> u32 {
    64
}

pub(crate) fn default_power_config() -> PowerConfig {
    PowerConfig {
        enabled: default_true(),
        sysfs_root: default_power_sysfs_root(),
        battery: default_battery_name(),
        ac: default_ac_name(),
        alert_threshold: default_alert_threshold(),
        poll_interval_secs: default_poll_interval_secs(),
    }
}

pub(crate) fn default_power_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/power_supply")
}

pub(crate) fn default_battery_name() -> String {
    "BAT0".to_string()
}

pub(crate) fn default_ac_name() -> String {
    "AC".to_string()
}

/// Battery percentage below which a discharging battery raises an alert.
pub(crate) fn default_alert_threshold() -> u8 {
    25
}

pub(crate) fn default_poll_interval_secs() -> u64 {
    30
}

pub(crate) fn default_clock_config() -> ClockConfig {
    ClockConfig {
        enabled: default_true(),
    }
}

pub(crate) fn default_network_config() -> NetworkConfig {
    NetworkConfig {
        enabled: default_true(),
        sysfs_root: default_network_sysfs_root(),
        poll_interval_secs: default_poll_interval_secs(),
    }
}

pub(crate) fn default_network_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/net")
}

pub(crate) fn default_panels() -> Vec<PanelConfig> {
    vec![PanelConfig {
        name: "status".to_string(),
        sources: vec![
            "date".to_string(),
            "time".to_string(),
            "power".to_string(),
            "networks".to_string(),
        ],
        color: default_panel_color(),
    }]
}

pub(crate) fn default_panel_color() -> String {
    "#202020e0".to_string()
}

pub(crate) fn default_alert_panel_config() -> AlertPanelConfig {
    AlertPanelConfig {
        sources: default_alert_sources(),
        color: default_alert_color(),
    }
}

pub(crate) fn default_alert_sources() -> Vec<String> {
    vec!["power".to_string(), "networks".to_string()]
}

pub(crate) fn default_alert_color() -> String {
    "#b00020ff".to_string()
}

pub(crate) fn default_outputs() -> Vec<String> {
    vec!["HEADLESS-1".to_string()]
}

pub(crate) fn default_true() -> bool {
    true
}
