use std::io;
use thiserror::Error;
use zenway_buffer_manager::BufferError;
use zenway_core::CoreError;

/// Setup and reactor errors of the system layer.
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Buffer pool error: {0}")]
    Buffer(#[from] BufferError),
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
    #[error("Failed to register '{name}' with the main loop: {source}")]
    Registration {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Errors of a single render pass.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Every buffer is held by the compositor; the frame is skipped.
    #[error("No free buffer for panel '{panel}'")]
    NoFreeBuffer { panel: String },
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("Painting panel '{panel}' failed: {message}")]
    Paint { panel: String, message: String },
    #[error("Committing panel '{panel}' failed: {message}")]
    Surface { panel: String, message: String },
    /// One or more outputs failed; the others were still drawn.
    #[error("Rendering failed on outputs: {}", .failed.join(", "))]
    Outputs { failed: Vec<String> },
}
