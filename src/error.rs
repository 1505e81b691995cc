/// Error types shared by the state and media layers
///
/// Storage and filesystem failures are wrapped so callers can propagate them
/// with `?`. The UI decides which ones become a status message and which ones
/// are only logged.

use thiserror::Error;

/// Result type for Haven operations
pub type Result<T> = std::result::Result<T, HavenError>;

#[derive(Error, Debug)]
pub enum HavenError {
    /// Key-value store failure (wraps rusqlite::Error)
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem failure while copying or deleting images
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted value could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot or thumbnail encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Requested project or comment does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected user input (empty project name, unusable image reference)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The scene renderer never reported ready within the retry policy
    #[error("Renderer not ready after {attempts} attempts")]
    RendererNotReady { attempts: u32 },

    /// Configuration could not be resolved
    #[error("Configuration error: {0}")]
    Config(String),
}
