//! General utilities for zenway core.
//!
//! - [`fs`]: filesystem helpers returning [`CoreError`](crate::error::CoreError).
//! - [`paths`]: XDG base directories and the application's own directories.

pub mod fs;
pub mod paths;

pub use fs::{ensure_dir_exists, read_file_to_string};
