use reqwest::StatusCode;
use thiserror::Error;

/// Errors that interrupt pagination against the NVDB API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("nvdb HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("nvdb service returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode nvdb page: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn status(status: StatusCode, body: String) -> Self {
        FetchError::Status { status, body }
    }
}
