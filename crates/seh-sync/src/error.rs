//! Error type for a single strategy run.

use thiserror::Error;

/// Why a strategy failed.
///
/// Every variant is handled by the orchestrator's error mode in the same
/// way; the split only tells the operator where the failure came from.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The API call failed after retries, was rejected, or hit the quota.
    #[error(transparent)]
    Api(#[from] seh_core::Error),

    /// Writing records or cursors failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] seh_store::Error),

    /// The vendor answered, but not with usable data.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl SyncError {
    /// Message stored on an error cursor, capped at 500 characters.
    pub fn cursor_message(&self) -> String {
        let message = self.to_string();
        if message.chars().count() > 500 {
            message.chars().take(500).collect()
        } else {
            message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_is_transparent() {
        let err = SyncError::from(seh_core::Error::Permanent {
            status: 403,
            message: "forbidden".into(),
        });
        assert_eq!(err.to_string(), "API request failed (HTTP 403): forbidden");
    }

    #[test]
    fn test_cursor_message_truncated() {
        let err = SyncError::Validation("x".repeat(600));
        assert_eq!(err.cursor_message().chars().count(), 500);
        assert_eq!(
            SyncError::Validation("No data returned".into()).cursor_message(),
            "Validation error: No data returned"
        );
    }
}
