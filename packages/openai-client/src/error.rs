//! Error types for OpenAI client.
//!
//! Variants keep the HTTP status so callers can decide whether a failure
//! is worth retrying (rate limits, overload) or not (bad key, bad request).

use std::time::Duration;
use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// OpenAI client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {message}")]
    Network { message: String, timeout: bool },

    /// HTTP 429 from the API
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Any other non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// HTTP status code, when the error came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the request could succeed if sent again later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } => true,
            // 408 timeout, 409 conflict, 5xx server/overload (529 is used for overload)
            Self::Api { status, .. } => matches!(*status, 408 | 409 | 500..=599),
            Self::Config(_) | Self::Parse(_) => false,
        }
    }

    /// Whether the API rejected our credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }

    /// Server-provided wait hint for rate-limited requests.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_transient() {
        let err = OpenAIError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_status_classification() {
        let overloaded = OpenAIError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        assert!(overloaded.is_transient());

        let unauthorized = OpenAIError::Api {
            status: 401,
            message: "bad key".into(),
        };
        assert!(!unauthorized.is_transient());
        assert!(unauthorized.is_auth());

        let bad_request = OpenAIError::Api {
            status: 400,
            message: "bad".into(),
        };
        assert!(!bad_request.is_transient());
        assert!(!OpenAIError::Parse("x".into()).is_transient());
    }
}
