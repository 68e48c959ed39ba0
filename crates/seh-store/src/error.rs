//! Error types for seh-store.

use std::path::PathBuf;

/// Result type for seh-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in seh-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The database was written by a newer schema than this build knows.
    #[error("Unsupported schema version {found} (expected at most {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },
}
