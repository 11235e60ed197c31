//! Error types for the vCenter session

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the management server
#[derive(Error, Debug)]
pub enum SessionError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server rejected the credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// API returned an error status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from server
        message: String,
    },

    /// Request did not complete in time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Response body had an unexpected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Session was already released
    #[error("not connected")]
    NotConnected,
}

impl SessionError {
    /// Check if the server reported the resource as temporarily unavailable
    ///
    /// vCenter answers guest queries with 503 while VMware Tools is not running.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SessionError::Api { status: 503, .. })
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
