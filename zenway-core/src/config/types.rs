//! Configuration Data Structures for zenway.
//!
//! These structs are populated by deserializing the TOML configuration file. Every
//! field has a default from [`super::defaults`], and unknown fields are rejected via
//! `#[serde(deny_unknown_fields)]` so that typos surface at startup.

use super::defaults;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration settings for the logging subsystem.
///
/// ```
/// use zenway_core::config::LoggingConfig;
///
/// let log_config: LoggingConfig = toml::from_str(r#"
/// level = "debug"
/// format = "json"
/// "#).unwrap();
/// assert_eq!(log_config.level, "debug");
/// assert_eq!(log_config.file_path, None);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level: "trace", "debug", "info", "warn" or "error" (case-insensitive).
    #[serde(default = "defaults::default_log_level")]
    pub level: String,
    /// Optional log file. Relative paths are resolved against the state directory.
    #[serde(default = "defaults::default_log_file_path")]
    pub file_path: Option<PathBuf>,
    /// "text" or "json".
    #[serde(default = "defaults::default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        defaults::default_logging_config()
    }
}

/// Dimensions and count of the shared-memory render buffers.
///
/// Every panel is drawn into one of these buffers, so `width` and `height` bound the
/// largest panel. Changing them requires recreating the pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    #[serde(default = "defaults::default_buffer_count")]
    pub count: usize,
    #[serde(default = "defaults::default_buffer_width")]
    pub width: u32,
    #[serde(default = "defaults::default_buffer_height")]
    pub height: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        defaults::default_buffer_config()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerConfig {
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,
    /// Root of the power supply class, normally `/sys/class/power_supply`.
    #[serde(default = "defaults::default_power_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default = "defaults::default_battery_name")]
    pub battery: String,
    #[serde(default = "defaults::default_ac_name")]
    pub ac: String,
    /// Capacity in percent below which a discharging battery raises an alert.
    #[serde(default = "defaults::default_alert_threshold")]
    pub alert_threshold: u8,
    #[serde(default = "defaults::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl PowerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        defaults::default_power_config()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        defaults::default_clock_config()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,
    /// Root of the network class, normally `/sys/class/net`.
    #[serde(default = "defaults::default_network_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default = "defaults::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl NetworkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        defaults::default_network_config()
    }
}

/// One panel on every output.
///
/// A panel is redrawn only when one of its `sources` has changed since the last
/// successful draw.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelConfig {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<String>,
    /// Background color, `#rrggbb` or `#rrggbbaa`.
    #[serde(default = "defaults::default_panel_color")]
    pub color: String,
}

/// The popup shown when a source raises an alert, even while panels are hidden.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertPanelConfig {
    #[serde(default = "defaults::default_alert_sources")]
    pub sources: Vec<String>,
    #[serde(default = "defaults::default_alert_color")]
    pub color: String,
}

impl Default for AlertPanelConfig {
    fn default() -> Self {
        defaults::default_alert_panel_config()
    }
}

/// Root configuration structure.
///
/// ```
/// use zenway_core::config::ZenwayConfig;
///
/// let config: ZenwayConfig = toml::from_str(r#"
/// [buffers]
/// count = 3
///
/// [[panels]]
/// name = "top"
/// sources = ["time"]
/// "#).unwrap();
/// assert_eq!(config.buffers.count, 3);
/// assert_eq!(config.buffers.width, 1920);
/// assert_eq!(config.panels[0].sources, vec!["time".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZenwayConfig {
    #[serde(default = "defaults::default_logging_config")]
    pub logging: LoggingConfig,
    #[serde(default = "defaults::default_buffer_config")]
    pub buffers: BufferConfig,
    #[serde(default = "defaults::default_power_config")]
    pub power: PowerConfig,
    #[serde(default = "defaults::default_clock_config")]
    pub clock: ClockConfig,
    #[serde(default = "defaults::default_network_config")]
    pub network: NetworkConfig,
    #[serde(default = "defaults::default_panels")]
    pub panels: Vec<PanelConfig>,
    #[serde(default = "defaults::default_alert_panel_config")]
    pub alert_panel: AlertPanelConfig,
    /// Names of the outputs panels are placed on.
    #[serde(default = "defaults::default_outputs")]
    pub outputs: Vec<String>,
}

impl Default for ZenwayConfig {
    fn default() -> Self {
        Self {
            logging: defaults::default_logging_config(),
            buffers: defaults::default_buffer_config(),
            power: defaults::default_power_config(),
            clock: defaults::default_clock_config(),
            network: defaults::default_network_config(),
            panels: defaults::default_panels(),
            alert_panel: defaults::default_alert_panel_config(),
            outputs: defaults::default_outputs(),
        }
    }
}

/// Parses `#rrggbb` or `#rrggbbaa` into a packed ARGB8888 value.
///
/// ```
/// use zenway_core::config::parse_argb;
///
/// assert_eq!(parse_argb("#ff0000"), Some(0xffff0000));
/// assert_eq!(parse_argb("#00ff0080"), Some(0x8000ff00));
/// assert_eq!(parse_argb("red"), None);
/// ```
pub fn parse_argb(s: &str) -> Option<u32> {
    let hex = s.strip_prefix('#')?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u32::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some(0xff00_0000 | channel(0)? << 16 | channel(2)? << 8 | channel(4)?),
        8 => Some(channel(6)? << 24 | channel(0)? << 16 | channel(2)? << 8 | channel(4)?),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_zenway_config_default_values() {
        let config = ZenwayConfig::default();
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.buffers.count, 2);
        assert_eq!(config.power.alert_threshold, 25);
        assert_eq!(config.power.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.outputs, vec!["HEADLESS-1".to_string()]);
        assert_eq!(config.panels.len(), 1);
    }

    #[test]
    fn test_zenway_config_deserialize_empty() {
        let config: ZenwayConfig = toml::from_str("").unwrap();
        assert_eq!(config, ZenwayConfig::default());
    }

    #[test]
    fn test_logging_config_deserialize_partial() {
        let config: LoggingConfig = serde_json::from_str(r#"{"level": "debug"}"#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.file_path, defaults::default_log_file_path());
        assert_eq!(config.format, defaults::default_log_format());
    }

    #[test]
    fn test_power_config_deserialize() {
        let config: ZenwayConfig = toml::from_str(
            r#"
            [power]
            battery = "BAT1"
            alert_threshold = 10
            sysfs_root = "/tmp/power"
            "#,
        )
        .unwrap();
        assert_eq!(config.power.battery, "BAT1");
        assert_eq!(config.power.ac, "AC");
        assert_eq!(config.power.alert_threshold, 10);
        assert_eq!(config.power.sysfs_root, PathBuf::from("/tmp/power"));
    }

    #[test]
    fn test_panel_requires_name() {
        let result = toml::from_str::<ZenwayConfig>("[[panels]]\nsources = [\"time\"]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = toml::from_str::<ZenwayConfig>("[buffers]\ncolour = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_argb_rejects_malformed() {
        assert_eq!(parse_argb("#12345"), None);
        assert_eq!(parse_argb("#gg0000"), None);
        assert_eq!(parse_argb("ff0000"), None);
        assert_eq!(parse_argb("#000000"), Some(0xff000000));
    }
}
