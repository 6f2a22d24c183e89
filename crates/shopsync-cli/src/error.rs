use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shopsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid run id: {0}")]
    InvalidRunId(String),
    #[error("Invalid review id: {0}")]
    InvalidReviewId(String),
    #[error("Invalid review decision: {0}")]
    InvalidDecision(String),
    #[error("Custom review decision requires --data with a JSON update payload")]
    MissingCustomData,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Remote catalog is not configured. Set SHOPSYNC_STORE_DOMAIN and SHOPSYNC_ACCESS_TOKEN (optionally SHOPSYNC_API_VERSION), or put them in a .env file."
    )]
    RemoteNotConfigured,
}
