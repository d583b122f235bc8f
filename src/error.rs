//! Error types for cache operations
//!
//! This module defines the error type shared by the codec, TTL resolution,
//! configuration and store layers. Upstream failures have their own type,
//! [`FetchError`](crate::fetch::FetchError), because they are part of the
//! fetch contract rather than cache internals.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration error - rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The URL could not be parsed or has no hostname
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A stored entry does not follow the tagged encoding
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// JSON body of an `O` entry could not be parsed or produced
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Store connection, read or write failure
    #[error("Store error: {0}")]
    Store(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

impl From<url::ParseError> for CacheError {
    fn from(e: url::ParseError) -> Self {
        CacheError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::InvalidConfig("ttl must be positive".to_string());
        assert_eq!(error.to_string(), "Invalid configuration: ttl must be positive");

        let url_error = CacheError::InvalidUrl {
            url: "not a url".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert!(url_error.to_string().contains("'not a url'"));

        let store_error = CacheError::Store("connection refused".to_string());
        assert!(store_error.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_conversion() {
        let error: CacheError = "test error".into();
        assert!(matches!(error, CacheError::Other(_)));

        let error: CacheError = "test error".to_string().into();
        assert!(matches!(error, CacheError::Other(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: CacheError = json_err.into();
        assert!(matches!(error, CacheError::Json(_)));
    }
}
