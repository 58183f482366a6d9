//! Security-specific error types.

use dccu_proto::ClearanceLevel;
use thiserror::Error;

/// Security-related errors.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// The viewer's clearance is below what the operation requires.
    #[error("insufficient clearance for data modification: {operation} requires {required}, viewer has {actual}")]
    InsufficientClearance {
        /// Operation that was attempted.
        operation: String,
        /// Level the operation requires.
        required: ClearanceLevel,
        /// Level the viewer holds.
        actual: ClearanceLevel,
    },

    /// A session token failed verification.
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// A session token could not be issued.
    #[error("token issuance failed: {0}")]
    TokenIssuance(String),
}

/// Result type for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;
