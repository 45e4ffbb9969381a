use thiserror::Error;

/// Errors raised while talking to an inference backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("API error{}: {message}", .status_code.map(|c| format!(" ({})", c)).unwrap_or_default())]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    #[error("Request timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },

    #[error("Rate limit exceeded{}", .retry_after.map(|s| format!(", retry after {} seconds", s)).unwrap_or_default())]
    RateLimitError { retry_after: Option<u64> },

    #[error("Invalid response from LLM: {message}")]
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Error: {message}")]
    Other { message: String },
}

impl BackendError {
    /// Whether the same request may succeed if sent again later.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::TimeoutError { .. }
            | BackendError::RateLimitError { .. }
            | BackendError::NetworkError { .. } => true,
            BackendError::ApiError {
                status_code: Some(code),
                ..
            } => *code >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            BackendError::ApiError {
                message: "boom".into(),
                status_code: Some(502)
            }
            .to_string(),
            "API error (502): boom"
        );
        assert_eq!(
            BackendError::ApiError {
                message: "boom".into(),
                status_code: None
            }
            .to_string(),
            "API error: boom"
        );
        assert_eq!(
            BackendError::RateLimitError {
                retry_after: Some(3)
            }
            .to_string(),
            "Rate limit exceeded, retry after 3 seconds"
        );
        assert_eq!(
            BackendError::RateLimitError { retry_after: None }.to_string(),
            "Rate limit exceeded"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::TimeoutError { seconds: 5 }.is_transient());
        assert!(BackendError::NetworkError {
            message: "reset".into()
        }
        .is_transient());
        assert!(BackendError::ApiError {
            message: "unavailable".into(),
            status_code: Some(503)
        }
        .is_transient());
        assert!(!BackendError::ApiError {
            message: "bad request".into(),
            status_code: Some(400)
        }
        .is_transient());
        assert!(!BackendError::AuthenticationError {
            message: "no key".into()
        }
        .is_transient());
    }
}
