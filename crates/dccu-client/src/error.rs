//! Client error types.

use dccu_core::SecurityError;
use thiserror::Error;

/// Failures reported by a [`Backend`](crate::backend::Backend).
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The targeted row does not exist.
    #[error("row not found")]
    NotFound,

    /// A payload could not be encoded or decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The push-change channel failed.
    #[error("subscription error: {0}")]
    Subscription(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BackendError::Subscription(e.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The viewer may not perform the operation. Raised before any backend call.
    #[error(transparent)]
    Unauthorized(#[from] SecurityError),

    /// A backend call failed.
    #[error("failed to {op} data: {source}")]
    Backend {
        op: &'static str,
        source: BackendError,
    },

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A row or payload did not match the record shape.
    #[error("decode error: {0}")]
    Decode(#[from] dccu_proto::Error),
}

impl Error {
    /// Wrap a backend failure for the named operation.
    pub fn backend(op: &'static str, source: BackendError) -> Self {
        Error::Backend { op, source }
    }

    /// Whether this error came from the clearance gate.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, Error>;
