//! HTTP error mapping utilities

use crate::error::ClientError;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

/// Map a non-success HTTP status and response body to a ClientError.
///
/// 429 is always `QuotaExceeded` so callers can back off differently from
/// other failures.
pub fn map_http_error(status: StatusCode, body: Option<String>, request_id: Uuid) -> ClientError {
    let error_message = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_message(&v))
        .or_else(|| body.filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()))
        });

    let message_with_id = format!("{} [request_id: {}]", error_message, request_id);

    match status {
        StatusCode::TOO_MANY_REQUESTS => ClientError::QuotaExceeded {
            message: message_with_id,
        },
        _ => ClientError::RequestFailed {
            status: Some(status.as_u16()),
            message: message_with_id,
        },
    }
}

/// Extract an error message from common JSON error bodies
fn extract_error_message(json: &Value) -> Option<String> {
    // OpenAI-compatible format: { "error": { "message": "..." } }
    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
    {
        return Some(message.to_string());
    }

    // Generic format: { "message": "..." } or { "error": "..." }
    if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
        return Some(message.to_string());
    }

    json.get("error")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_quota_exceeded() {
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, None, Uuid::nil());
        assert!(matches!(err, ClientError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_nested_error_message_is_used() {
        let body = r#"{"error":{"message":"bad key","type":"auth"}}"#.to_string();
        let err = map_http_error(StatusCode::UNAUTHORIZED, Some(body), Uuid::nil());
        match err {
            ClientError::RequestFailed { status, message } => {
                assert_eq!(status, Some(401));
                assert!(message.starts_with("bad key"));
            }
            other => panic!("Expected RequestFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_body_is_used_verbatim() {
        let err = map_http_error(
            StatusCode::BAD_GATEWAY,
            Some("upstream down".to_string()),
            Uuid::nil(),
        );
        assert!(err.to_string().contains("upstream down"));
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_empty_body_falls_back_to_reason() {
        let err = map_http_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some(String::new()),
            Uuid::nil(),
        );
        assert!(err.to_string().contains("Internal Server Error"));
    }
}
