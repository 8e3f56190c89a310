//! Error type for the host tools.

use std::path::PathBuf;

use foundry_core::error::GameError;
use thiserror::Error;

/// Result type alias using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;

/// Anything that can go wrong outside the simulation core.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A file could not be read, written or removed.
    #[error("{}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying failure.
        source: std::io::Error,
    },

    /// Configuration or state rejected by the core.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A save file could not be encoded or decoded.
    #[error("save file encoding: {0}")]
    Encoding(#[from] bincode::Error),

    /// A save file was written by a different layout version.
    #[error("save file version mismatch: expected {expected}, got {found}")]
    SaveVersion {
        /// Version this build writes.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Output could not be rendered as JSON.
    #[error("json output: {0}")]
    Json(#[from] serde_json::Error),

    /// A command-line value was unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ToolError {
    /// Attach a path to an IO error.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
