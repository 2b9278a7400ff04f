//! API error response parsing.
//!
//! Handles the error envelopes the gateway and its upstreams return:
//! - Gateway:  `{"error": "..."}`
//! - Standard: `{"error": {"message": "...", "type": "..."}}`
//! - Detail:   `{"detail": "..."}`
//! - Flat:     `{"message": "..."}`

use serde_json::Value;

/// Parsed API error information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiErrorInfo {
    /// Human-readable error message.
    pub message: String,
    /// Whether the request can be retried (429 or 5xx).
    pub retryable: bool,
}

/// Parse an API error response body into structured error info.
///
/// Falls back to `HTTP {status}: {body}` when no envelope matches.
pub fn parse_api_error(body: &str, status: u16) -> ApiErrorInfo {
    let retryable = status == 429 || status >= 500;

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| extract_message(&json))
        .unwrap_or_else(|| fallback_message(body, status));

    ApiErrorInfo { message, retryable }
}

fn extract_message(json: &Value) -> Option<String> {
    json["error"]
        .as_str()
        .or_else(|| json["error"]["message"].as_str())
        .or_else(|| json["detail"].as_str())
        .or_else(|| json["message"].as_str())
        .filter(|m| !m.is_empty())
        .map(String::from)
}

fn fallback_message(body: &str, status: u16) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", medi_core::text::truncate_str(body, 500))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
