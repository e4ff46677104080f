use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Non-2xx response from the shuro API, carrying the server's detail text.
    #[error("API error {status}: {detail}")]
    Api { status: StatusCode, detail: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request was superseded or the session was torn down.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Decoded body violates the expected schema
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job history error: {0}")]
    History(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Transient API failure that a later attempt may not hit
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => crate::transport::RetryPolicy::is_retryable(*status),
            _ => false,
        }
    }

    /// Server-supplied detail text for display.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Api { detail, .. } => Some(detail.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_and_accessors() {
        let err = ClientError::Api {
            status: StatusCode::NOT_FOUND,
            detail: "Project not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error 404 Not Found: Project not found");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.detail(), Some("Project not found"));
        assert!(!err.is_cancelled());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_gateway_errors_are_retryable() {
        let err = ClientError::Api {
            status: StatusCode::GATEWAY_TIMEOUT,
            detail: "Gateway Timeout".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_cancelled_has_no_status() {
        let err = ClientError::Cancelled;
        assert!(err.is_cancelled());
        assert_eq!(err.status(), None);
        assert_eq!(err.detail(), None);
    }
}
