//! # zenway Core Library (`zenway-core`)
//!
//! `zenway-core` is the foundational library of the zenway overlay. It holds the
//! pieces every other crate in the workspace leans on:
//!
//! - **Error Handling**: [`CoreError`] and its specific companions [`ConfigError`]
//!   and [`LoggingError`].
//! - **Configuration Management**: TOML configuration with defaults and validation,
//!   through [`ConfigLoader`] and [`ZenwayConfig`].
//! - **Logging**: a `tracing` based setup configurable for console and file output in
//!   text or JSON format.
//! - **Utility Functions**: filesystem helpers and XDG path resolution.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zenway_core::config::ConfigLoader;
//! use zenway_core::logging::init_logging;
//! use zenway_core::error::CoreError;
//!
//! fn main() -> Result<(), CoreError> {
//!     let config = ConfigLoader::load(None)?;
//!     init_logging(&config.logging, false)?;
//!     tracing::info!("zenway core initialized.");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

// Re-export key types for convenience
pub use config::{
    AlertPanelConfig, BufferConfig, ClockConfig, ConfigLoader, LoggingConfig, NetworkConfig,
    PanelConfig, PowerConfig, ZenwayConfig,
};
pub use error::{ConfigError, CoreError, LoggingError};
pub use logging::{init_logging, init_minimal_logging, scoped_minimal_logging};
