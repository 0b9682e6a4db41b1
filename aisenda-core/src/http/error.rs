//! HTTP error mapping utilities

use crate::providers::ProviderError;
use serde_json::Value;
use uuid::Uuid;

/// Longest raw body excerpt kept in an error message
const MAX_BODY_EXCERPT: usize = 200;

/// Map a non-2xx status and response body to a ProviderError
pub fn map_http_error(status: u16, body: Option<&str>, request_id: Uuid) -> ProviderError {
    let detail = body
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_message(&v))
        .or_else(|| {
            body.map(str::trim)
                .filter(|b| !b.is_empty())
                .map(|b| b.chars().take(MAX_BODY_EXCERPT).collect())
        })
        .unwrap_or_else(|| format!("HTTP error {}", status));

    ProviderError::Http {
        status,
        message: format!("{} [request_id: {}]", detail, request_id),
    }
}

/// Extract an error message from common JSON error bodies
fn extract_error_message(json: &Value) -> Option<String> {
    // OpenAI format: { "error": { "message": "...", "type": "...", "code": "..." } }
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
    fn test_openai_error_body() {
        let body = r#"{"error":{"message":"Invalid API key","type":"auth"}}"#;
        let err = map_http_error(401, Some(body), Uuid::nil());
        match err {
            ProviderError::Http { status, message } => {
                assert_eq!(status, 401);
                assert!(message.starts_with("Invalid API key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_body_is_excerpted() {
        let body = "x".repeat(500);
        let err = map_http_error(502, Some(&body), Uuid::nil());
        let message = err.to_string();
        assert!(message.contains("status: 502"));
        assert!(message.len() < 300);
    }

    #[test]
    fn test_missing_body() {
        let err = map_http_error(500, None, Uuid::nil());
        assert!(err.to_string().contains("HTTP error 500"));
    }
}
