//! Error types for parsing vendor values in seh-types.

use thiserror::Error;

/// Errors that can occur when parsing identifiers and timestamps.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// A data-type tag that is not one of the known strategies.
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    /// A sync status string that is not `success`, `partial` or `error`.
    #[error("Unknown sync status: {0}")]
    UnknownStatus(String),

    /// A timestamp or date in none of the accepted vendor formats.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Result type alias using seh-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
