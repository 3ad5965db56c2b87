//! Error types and gateway error-message extraction.
//!
//! # Design
//! Gateway calls never return `Err`: transport failures are folded into
//! `ApiResult::transport_error`. `TransportError` exists for the seam between
//! a `Transport` and the client, and `ConfigError` for environment parsing.
//! `extract_error_message` is the one place that knows the vendor's error
//! payload shapes.

use serde_json::Value;
use thiserror::Error;

use crate::http::{ApiResult, ResponseBody};

/// Failure to complete an HTTP round-trip.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS, timeout, or protocol failure before a status arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The status arrived but the body could not be read.
    #[error("failed to read response body (HTTP {status}): {message}")]
    Body { status: u16, message: String },
}

impl TransportError {
    /// Last status observed before the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Request(_) => None,
            TransportError::Body { status, .. } => Some(*status),
        }
    }
}

/// Invalid configuration input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Derive a human-readable message from a failed call.
///
/// A transport error wins over anything in the body. Otherwise the known
/// vendor shapes are tried in order: `error` (string, or any other non-null,
/// non-false value rendered as JSON), `message` string, then
/// `response.message[0]`. A non-blank plain-text body is used verbatim.
pub fn extract_error_message(result: &ApiResult) -> Option<String> {
    if let Some(err) = result.transport_error.as_deref() {
        if !err.trim().is_empty() {
            return Some(format!("Network error: {err}"));
        }
    }

    match result.body.as_ref()? {
        ResponseBody::Json(value) => message_from_json(value),
        ResponseBody::Text(text) if !text.trim().is_empty() => {
            Some(format!("API Response: {}", text.trim()))
        }
        ResponseBody::Text(_) => None,
    }
}

fn message_from_json(value: &Value) -> Option<String> {
    match value.get("error") {
        Some(Value::String(s)) => return Some(format!("API Error: {s}")),
        Some(Value::Null) | Some(Value::Bool(false)) | None => {}
        Some(other) => return Some(format!("API Error: {other}")),
    }

    if let Some(Value::String(s)) = value.get("message") {
        return Some(format!("API Message: {s}"));
    }

    match value.get("response").and_then(|r| r.get("message")) {
        Some(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .map(|s| format!("API Error: {s}")),
        Some(Value::String(s)) => Some(format!("API Error: {s}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failed(status: u16, body: ResponseBody) -> ApiResult {
        ApiResult {
            ok: false,
            status_code: Some(status),
            body: Some(body),
            transport_error: None,
        }
    }

    #[test]
    fn error_string_is_used() {
        let result = failed(401, ResponseBody::Json(json!({"error": "Unauthorized"})));
        assert_eq!(extract_error_message(&result).as_deref(), Some("API Error: Unauthorized"));
    }

    #[test]
    fn error_object_is_rendered_as_json() {
        let result = failed(400, ResponseBody::Json(json!({"error": {"code": 7}})));
        assert_eq!(extract_error_message(&result).as_deref(), Some(r#"API Error: {"code":7}"#));
    }

    #[test]
    fn message_string_is_used() {
        let result = failed(500, ResponseBody::Json(json!({"message": "boom"})));
        assert_eq!(extract_error_message(&result).as_deref(), Some("API Message: boom"));
    }

    #[test]
    fn nested_response_message_is_used() {
        let result = failed(
            404,
            ResponseBody::Json(json!({
                "status": 404,
                "error": false,
                "response": {"message": ["The \"foo\" instance does not exist"]}
            })),
        );
        assert_eq!(
            extract_error_message(&result).as_deref(),
            Some("API Error: The \"foo\" instance does not exist")
        );
    }

    #[test]
    fn error_takes_precedence_over_nested_message() {
        let result = failed(
            404,
            ResponseBody::Json(json!({
                "error": "Not Found",
                "response": {"message": ["missing"]}
            })),
        );
        assert_eq!(extract_error_message(&result).as_deref(), Some("API Error: Not Found"));
    }

    #[test]
    fn transport_error_wins() {
        let result = ApiResult {
            ok: false,
            status_code: None,
            body: None,
            transport_error: Some("request failed: timed out".to_string()),
        };
        assert_eq!(
            extract_error_message(&result).as_deref(),
            Some("Network error: request failed: timed out")
        );
    }

    #[test]
    fn plain_text_body_is_used_when_not_blank() {
        let result = failed(502, ResponseBody::Text(" Bad Gateway \n".to_string()));
        assert_eq!(extract_error_message(&result).as_deref(), Some("API Response: Bad Gateway"));

        let blank = failed(502, ResponseBody::Text("   ".to_string()));
        assert!(extract_error_message(&blank).is_none());
    }

    #[test]
    fn unknown_shape_yields_none() {
        let result = failed(500, ResponseBody::Json(json!({"status": 500})));
        assert!(extract_error_message(&result).is_none());
    }
}
