//! Error types for shopsync-core

use thiserror::Error;

/// Result type alias using shopsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shopsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found (vendor, product, run, or review item)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote catalog HTTP transport error
    #[error("Remote catalog error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote catalog API rejected the request
    #[error("Remote API error: {0}")]
    RemoteApi(String),

    /// Remote catalog rate limit hit
    #[error("Rate limited by remote catalog (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// Request was well-formed but rejected by validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sync direction or feature not implemented
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Sync engine failure
    #[error("Sync error: {0}")]
    Sync(String),
}
