//! Common error types for Patak

use thiserror::Error;

/// Common result type for Patak operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Patak services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required field missing or malformed on an incoming submission
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with the current state of a record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
