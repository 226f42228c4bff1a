//! Typed errors for the API client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Token or host configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The HTTP client could not be built.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    /// Still rate limited after the retry policy gave up.
    #[error("rate limited after {attempts} attempt(s): {message}")]
    RateLimited { attempts: u32, message: String },

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(ApiError::NotFound("x".into()).is_not_found());
        let limited = ApiError::RateLimited {
            attempts: 3,
            message: "slow down".into(),
        };
        assert!(limited.is_rate_limited());
        assert!(!limited.is_not_found());
        assert!(!ApiError::Decode("bad".into()).is_rate_limited());
    }

    #[test]
    fn test_display_includes_attempts() {
        let err = ApiError::RateLimited {
            attempts: 11,
            message: "too many requests".into(),
        };
        assert_eq!(
            err.to_string(),
            "rate limited after 11 attempt(s): too many requests"
        );
    }
}
