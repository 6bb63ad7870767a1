//! Error types used throughout the feeder

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Categories of feed errors, used for log labels and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or unreadable configuration and credential files - fatal
    Config,
    /// Login or ticket negotiation rejected (401/403)
    Auth,
    /// Connection refused, DNS failure, request timeout
    Transport,
    /// Response body is not a valid envelope
    Decode,
    /// Service answered with 5xx or a non-zero envelope status
    Server,
    /// Service rejected the request (4xx except auth)
    Client,
    /// Operation aborted by a cancellation signal
    Cancelled,
    /// Anything else (serialization of outgoing batches, join failures)
    Internal,
}

impl ErrorCategory {
    /// Stable label used as a structured logging field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Server => "server",
            Self::Client => "client",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

/// Main error type for solrfeed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FeedError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedError {
    /// Get the error category for this error
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Auth(_) => ErrorCategory::Auth,
            Self::Network(_) | Self::Timeout(_) => ErrorCategory::Transport,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::Server { .. } => ErrorCategory::Server,
            Self::Client { .. } => ErrorCategory::Client,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this error should be retried.
    ///
    /// Auth is fatal here. Callers that wrap login in their own retry decide
    /// for themselves.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Decode | ErrorCategory::Server
        )
    }

    /// HTTP status carried by the error, if the service answered at all.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for solrfeed operations
pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(FeedError::Config("x".into()).category(), ErrorCategory::Config);
        assert_eq!(FeedError::Timeout("x".into()).category(), ErrorCategory::Transport);
        assert_eq!(FeedError::Network("x".into()).category(), ErrorCategory::Transport);
        assert_eq!(
            FeedError::Server { status: 503, message: "down".into() }.category(),
            ErrorCategory::Server
        );
        assert_eq!(FeedError::Decode("x".into()).category().as_str(), "decode");
    }

    #[test]
    fn test_is_retryable() {
        assert!(FeedError::Network("refused".into()).is_retryable());
        assert!(FeedError::Decode("not json".into()).is_retryable());
        assert!(!FeedError::Auth("401".into()).is_retryable());
        assert!(FeedError::Server { status: 500, message: String::new() }.is_retryable());
        assert!(!FeedError::Config("missing keytab".into()).is_retryable());
        assert!(!FeedError::Client { status: 400, message: String::new() }.is_retryable());
        assert!(!FeedError::Cancelled.is_retryable());
    }

    #[test]
    fn test_decode_is_distinct_from_transport() {
        let decode: FeedError = serde_json::from_str::<serde_json::Value>("<html>")
            .map_err(FeedError::from)
            .unwrap_err();
        assert_eq!(decode.category(), ErrorCategory::Decode);
        assert_ne!(decode.category(), FeedError::Network("x".into()).category());
    }

    #[test]
    fn test_serialization_format() {
        let json = serde_json::to_value(FeedError::Auth("denied".into())).unwrap();
        assert_eq!(json["type"], "Auth");
        assert_eq!(json["message"], "denied");
    }
}
