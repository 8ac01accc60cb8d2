use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No completion found")]
    NoCompletion,

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("No backend configured")]
    NotConfigured,

    #[error("Backend not found: {0}")]
    NotFound(String),
}
