//! Configuration Management for zenway.
//!
//! - [`types`]: the configuration schema ([`ZenwayConfig`] and its sections).
//! - [`defaults`]: default values used by serde when a field is missing.
//! - [`loader`]: locating, parsing and validating the file through [`ConfigLoader`].
//!
//! ## Configuration Loading Process
//!
//! 1. An explicit path (the first command line argument) is used when given and must
//!    exist.
//! 2. Otherwise `$XDG_CONFIG_HOME/zenway/config.toml` is tried.
//! 3. If no file is found, [`ZenwayConfig::default`] is used.
//! 4. The result is validated: log level and format are normalized, relative log file
//!    paths are resolved against the state directory, and buffer and panel settings
//!    are range-checked.

pub(crate) mod defaults;
pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    parse_argb, AlertPanelConfig, BufferConfig, ClockConfig, LoggingConfig, NetworkConfig,
    PanelConfig, PowerConfig, ZenwayConfig,
};

/// Hard upper bound for the buffer pool size.
pub const MAX_BUFFER_COUNT: usize = 3;
