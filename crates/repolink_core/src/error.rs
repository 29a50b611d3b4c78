//! Error taxonomy for the sync engine.
//!
//! The public entry points propagate [`SyncError::Authentication`],
//! [`SyncError::Network`] and [`SyncError::Server`]. Best-effort sub-steps
//! (legacy migration, reverse legacy push) log and swallow whatever they hit.

use thiserror::Error;

/// Errors produced by the sync engine and its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No auth token could be obtained for the backend call.
    #[error("Authentication required: {0}")]
    Authentication(String),

    /// Transport-level failure (connect, timeout, body read).
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the backend, carrying the server's message.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message from the response's `error` field, or the raw body.
        message: String,
    },

    /// An id or name failed validation. Filtered silently by the sync
    /// passes; only surfaced by explicit validation helpers and local edits.
    #[error("Invalid {0}")]
    Validation(String),

    /// The local key-value store rejected a read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored document or wire body could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether the backend rejected the credentials (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Server { status: 401, .. })
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Network(format!("request timed out: {}", err))
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

/// Result type alias for sync engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display_includes_message() {
        let err = SyncError::Server {
            status: 409,
            message: "project already linked".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Server error (409): project already linked"
        );
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_unauthorized_detection() {
        let err = SyncError::Server {
            status: 401,
            message: "expired".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(!SyncError::Network("down".to_string()).is_unauthorized());
    }
}
