//! Error types for product lookup

use pantry_core::{Error as CoreError, ErrorCode};
use thiserror::Error;

/// Result type alias for lookup operations
pub type LookupResult<T> = Result<T, LookupError>;

/// Lookup errors
///
/// None of these reach the scanning caller directly: the provider chain logs
/// them and moves on to the next provider.
#[derive(Error, Debug)]
pub enum LookupError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider returned an error response
    #[error("Provider error ({status}): {message}")]
    ApiResponse {
        /// HTTP status code
        status: u16,
        /// Error message from the provider
        message: String,
    },

    /// Circuit breaker is open
    #[error("Circuit breaker is open - provider temporarily unavailable")]
    CircuitOpen,

    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts failed: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Last error message
        last_error: String,
    },

    /// Barcode cannot be looked up
    #[error("Invalid barcode: {0}")]
    InvalidBarcode(String),
}

impl LookupError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider response error
    pub fn api_response(status: u16, message: impl Into<String>) -> Self {
        Self::ApiResponse {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            // Retry on connection errors, timeouts
            Self::Request(e) => e.is_connect() || e.is_timeout(),
            // Retry on 5xx errors and 429 (rate limited)
            Self::ApiResponse { status, .. } => *status >= 500 || *status == 429,
            Self::CircuitOpen
            | Self::Config(_)
            | Self::Json(_)
            | Self::RetriesExhausted { .. }
            | Self::InvalidBarcode(_) => false,
        }
    }

    /// Check if the provider simply has no record (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiResponse { status: 404, .. })
    }
}

impl From<LookupError> for CoreError {
    fn from(err: LookupError) -> Self {
        let code = match &err {
            LookupError::CircuitOpen | LookupError::Request(_) | LookupError::RetriesExhausted { .. } => {
                ErrorCode::ProviderUnavailable
            }
            LookupError::ApiResponse { .. } | LookupError::Json(_) => ErrorCode::ProviderResponse,
            LookupError::InvalidBarcode(_) => ErrorCode::InvalidBarcode,
            LookupError::Config(_) => ErrorCode::ConfigError,
        };
        CoreError::new(code, err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(LookupError::api_response(503, "down").is_retryable());
        assert!(LookupError::api_response(429, "slow down").is_retryable());
        assert!(!LookupError::api_response(404, "missing").is_retryable());
        assert!(!LookupError::CircuitOpen.is_retryable());
    }

    #[test]
    fn test_not_found() {
        assert!(LookupError::api_response(404, "").is_not_found());
        assert!(!LookupError::api_response(500, "").is_not_found());
    }

    #[test]
    fn test_into_core_error() {
        let err: CoreError = LookupError::InvalidBarcode("empty value".to_string()).into();
        assert_eq!(err.code, ErrorCode::InvalidBarcode);
        assert!(err.message.contains("empty value"));
    }
}
