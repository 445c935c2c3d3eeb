//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or decoding wire messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A line grew past the configured maximum without a terminator
    #[error("Line too long: {size} bytes exceeds maximum of {max} bytes")]
    LineTooLong { size: usize, max: usize },

    /// A line was not valid JSON for the expected message shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
