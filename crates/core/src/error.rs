//! Top-level error type shared by the application crates.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to the application before or while the render loop runs.
#[derive(Error, Debug)]
pub enum Error {
    /// GPU setup or runtime failure that cannot be recovered from.
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or surface errors
    #[error("Window error: {0}")]
    Window(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed or is inconsistent.
    #[error("Config error in '{path}': {message}")]
    Config {
        /// File the configuration was read from.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
