//! Error types for seh-core.
//!
//! This module defines the errors that can occur while talking to the
//! SolarEdge monitoring API.
//!
//! # Error Classification
//!
//! | Error Type | Retried by [`crate::with_retry`] | Typical cause |
//! |------------|-----------------------------------|---------------|
//! | [`Error::Transient`] | Yes | Network failure, timeout, HTTP 5xx |
//! | [`Error::Throttled`] | Yes | HTTP 429 from the vendor |
//! | [`Error::QuotaExhausted`] | No | Local daily quota used up |
//! | [`Error::Permanent`] | No | HTTP 4xx other than 429 |
//! | [`Error::Validation`] | No | Body does not have the expected shape |
//! | [`Error::InvalidConfig`] | No | Bad base URL or client settings |
//!
//! `Transient` and `Throttled` errors only reach the caller after
//! `max_retries` retries have been spent; every other kind surfaces on the
//! first occurrence.
//!
//! Some endpoints answer 400 or 403 when a feature is not enabled for a
//! site. [`Error::status_code`] lets callers recognise those cases.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when calling the monitoring API.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Network failure, timeout or server-side (5xx) error.
    #[error("Transient API error{}: {message}", fmt_status(.status))]
    Transient {
        /// HTTP status, absent for connection-level failures.
        status: Option<u16>,
        message: String,
    },

    /// The vendor answered HTTP 429.
    #[error("API throttled the request (HTTP 429): {message}")]
    Throttled { message: String },

    /// The local rolling 24-hour quota is used up and will not free up
    /// within the caller's tolerance.
    #[error("Daily API limit ({limit}) reached; next slot frees in {retry_after:?}")]
    QuotaExhausted {
        limit: u32,
        /// Time until the oldest request leaves the window.
        retry_after: Duration,
    },

    /// Client error other than 429. Not retried.
    #[error("API request failed (HTTP {status}): {message}")]
    Permanent { status: u16, message: String },

    /// The response did not have the expected shape.
    #[error("Unexpected API response: {0}")]
    Validation(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    /// Whether the retry policy should try the request again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient { .. } | Error::Throttled { .. })
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Transient { status, .. } => *status,
            Error::Throttled { .. } => Some(429),
            Error::Permanent { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate(body, 200);
        match status {
            429 => Error::Throttled { message },
            s if s >= 500 => Error::Transient {
                status: Some(s),
                message,
            },
            s => Error::Permanent { status: s, message },
        }
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Result type alias using seh-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
