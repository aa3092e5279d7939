//! Common error types for Opus

use thiserror::Error;

/// Common result type for Opus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Opus service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request conflicts with existing data (e.g. guarded delete)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not signed in, or the session expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Spotify Web API or accounts endpoint failure
    #[error("Spotify API error: {0}")]
    Spotify(String),

    /// Metadata inference (LLM) failure
    #[error("Inference error: {0}")]
    Inference(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
