//! Client error types and handling

use crate::protocol::Role;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of the chat client.
///
/// None of these are retried internally; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A history turn carried a role that cannot appear after the instruction
    #[error("Invalid role in message history: {0}")]
    InvalidRole(Role),

    /// The service answered 429
    #[error("Quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// Non-success status or transport-level failure
    #[error("Request failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },

    /// The client could not be built from its configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    pub fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        ClientError::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::QuotaExceeded { .. } => Some(429),
            ClientError::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if status == Some(429) {
            return ClientError::QuotaExceeded {
                message: err.to_string(),
            };
        }

        let message = if err.is_timeout() {
            format!("Request timed out: {}", err)
        } else if err.is_connect() {
            format!("Connection failed: {}", err)
        } else {
            err.to_string()
        };

        ClientError::RequestFailed { status, message }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::request_failed(None, format!("Invalid JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status() {
        let err = ClientError::request_failed(Some(500), "boom");
        assert_eq!(err.to_string(), "Request failed with status 500: boom");

        let err = ClientError::request_failed(None, "reset");
        assert_eq!(err.to_string(), "Request failed: reset");
    }

    #[test]
    fn test_quota_reports_429() {
        let err = ClientError::QuotaExceeded {
            message: "slow down".into(),
        };
        assert_eq!(err.status(), Some(429));
    }
}
