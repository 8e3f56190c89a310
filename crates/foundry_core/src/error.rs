//! Error types for the simulation core.
//!
//! Gameplay refusals (not enough energy, a full line, an unaffordable
//! upgrade) are not errors of this kind; they live next to the operation
//! that refuses. [`GameError`] covers data that cannot be used at all.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for configuration and state loading.
#[derive(Debug, Error)]
pub enum GameError {
    /// Configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but violates one or more constraints.
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
