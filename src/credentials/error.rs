//! Credential error types.

use thiserror::Error;

/// Errors that can occur while obtaining or refreshing an access token.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No credential stored for the account.
    #[error("No stored credential for env_key {0}")]
    NotFound(String),

    /// The refresh exchange was rejected or returned an unusable body.
    #[error("Refresh failed: {0}")]
    RefreshFailed(String),

    /// Bootstrap inputs are missing or incomplete.
    #[error("Incomplete bootstrap credential: {0}")]
    Incomplete(String),

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error while reading a token file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
