use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the ERP backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout, ...)
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport-level failure reported by a non-reqwest transport
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("backend returned {0}")]
    Status(StatusCode),

    /// The response body was not the JSON we expected
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Login failures, each carrying the message shown under the login form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("Please select a role")]
    MissingRole,

    #[error("Server error. Please check if the backend is running.")]
    Server,

    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected error. Please try again.")]
    Unexpected,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
