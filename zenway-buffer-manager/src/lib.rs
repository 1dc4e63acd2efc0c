//! # zenway Buffer Manager
//!
//! This crate owns the shared-memory render targets panels are drawn into. A
//! [`BufferPool`] maps one anonymous file and carves it into a fixed number of
//! equally sized ARGB8888 [`Buffer`]s. A buffer is handed to the compositor by
//! [`Buffer::lock`] and becomes available again only through [`Buffer::release`], so
//! a buffer that is being displayed is never written.

pub mod buffer;

// Re-export key types for convenience.
pub use buffer::{Buffer, BufferError, BufferFormat, BufferHandle, BufferPool, BYTES_PER_PIXEL};
