//! Error types for asset loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for asset loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Required asset file is missing.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The OBJ parser rejected the file.
    #[error("Failed to load OBJ file '{path}': {message}")]
    ObjLoad { path: PathBuf, message: String },

    /// OBJ file parsed but holds no shape.
    #[error("OBJ file '{0}' contains no shapes")]
    NoShapes(PathBuf),

    /// More corners than a 16-bit index can address.
    #[error("Mesh '{path}' has {count} corners, more than a 16-bit index buffer can address")]
    TooManyVertices { path: PathBuf, count: usize },

    /// The KTX2 container is malformed.
    #[error("Failed to parse KTX2 file '{path}': {message}")]
    Ktx2Parse { path: PathBuf, message: String },

    /// Valid KTX2 that cannot be uploaded as-is.
    #[error("Unsupported texture '{path}': {reason}")]
    UnsupportedTexture { path: PathBuf, reason: String },
}

/// Result type alias for asset operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
