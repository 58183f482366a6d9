//! Data model error types.

use thiserror::Error;

/// Data model errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A clearance level string did not name one of the four tiers.
    #[error("unknown clearance level: {0}")]
    UnknownClearance(String),

    /// A table name did not match any known table.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A row could not be decoded into a record.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
