//! # Transport client
//!
//! Sends the conversation context to the chat-completion endpoint and hands
//! back the raw streaming body. The fixed system instruction is prepended on
//! every request; it never enters the transcript.
//!
//! Non-success statuses are classified before any body bytes reach the
//! parser: 429 is [`TransportError::RateLimited`], 402 is
//! [`TransportError::QuotaExceeded`], anything else is
//! [`TransportError::Api`].

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use medi_core::messages::{Message, WireMessage};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing::{debug, error, instrument, warn};

use crate::error::{TransportError, TransportResult};
use crate::error_parsing::parse_api_error;
use crate::sse::{FragmentStream, fragment_stream};

/// Behavioural instruction sent as the first message of every request.
pub const MEDICAL_SYSTEM_PROMPT: &str = include_str!("prompts/medical-system-prompt.md");

/// Content type of a streaming response.
const EVENT_STREAM: &str = "text/event-stream";

/// Boxed stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// A successful (2xx) streaming response.
pub struct ChatResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Raw body chunks in arrival order.
    pub body: ByteStream,
}

impl ChatResponse {
    /// Wrap an already-available byte stream as a `200 text/event-stream` response.
    pub fn event_stream(body: ByteStream) -> Self {
        Self {
            status: 200,
            content_type: Some(EVENT_STREAM.to_string()),
            body,
        }
    }

    /// Parse the body into text fragments.
    pub fn into_fragments(self) -> FragmentStream {
        fragment_stream(self.body)
    }
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Sends a conversation context and returns the streaming response.
///
/// Implementors never touch session state; the controller owns it.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `context` (prior transcript plus the new user message).
    ///
    /// Fails with [`TransportError::InvalidContext`] before any I/O when the
    /// context is empty or does not end with a user message.
    async fn send(&self, context: &[Message]) -> TransportResult<ChatResponse>;
}

/// Check the shape every request must have.
pub fn validate_context(context: &[Message]) -> TransportResult<()> {
    match context.last() {
        None => Err(TransportError::InvalidContext {
            message: "context is empty".into(),
        }),
        Some(last) if !last.is_user() => Err(TransportError::InvalidContext {
            message: "context must end with a user message".into(),
        }),
        Some(_) => Ok(()),
    }
}

/// Endpoint configuration for [`HttpChatTransport`].
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Full endpoint URL.
    pub url: String,
    /// Bearer token. The `Authorization` header is omitted when `None`.
    pub api_key: Option<String>,
    /// Model identifier. The `model` field is omitted when `None`.
    pub model: Option<String>,
    /// System instruction prepended to every request.
    pub system_prompt: String,
}

impl HttpTransportConfig {
    /// Configuration for `url` with the compiled-in system instruction.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            model: None,
            system_prompt: MEDICAL_SYSTEM_PROMPT.trim_end().to_string(),
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Replace the system instruction.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<WireMessage>,
    stream: bool,
}

/// reqwest-backed [`ChatTransport`].
pub struct HttpChatTransport {
    config: HttpTransportConfig,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl HttpChatTransport {
    /// Create a transport with its own HTTP client.
    pub fn new(config: HttpTransportConfig) -> TransportResult<Self> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a transport with a shared HTTP client.
    pub fn with_client(
        config: HttpTransportConfig,
        client: reqwest::Client,
    ) -> TransportResult<Self> {
        let headers = build_headers(config.api_key.as_deref())?;
        if config.api_key.is_none() {
            warn!(url = %config.url, "no API key configured, sending unauthenticated requests");
        }
        Ok(Self {
            config,
            headers,
            client,
        })
    }

    /// Endpoint configuration.
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn build_body(&self, context: &[Message]) -> ChatRequest<'_> {
        let mut messages = Vec::with_capacity(context.len() + 1);
        messages.push(WireMessage::system(self.config.system_prompt.clone()));
        messages.extend(context.iter().map(WireMessage::from));
        ChatRequest {
            model: self.config.model.as_deref(),
            messages,
            stream: true,
        }
    }
}

fn build_headers(api_key: Option<&str>) -> TransportResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let _ = headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
    if let Some(key) = api_key {
        let value =
            HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| TransportError::Config {
                message: format!("invalid API key header: {e}"),
            })?;
        let _ = headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    #[instrument(skip_all, fields(messages = context.len()))]
    async fn send(&self, context: &[Message]) -> TransportResult<ChatResponse> {
        validate_context(context)?;
        let body = self.build_body(context);

        debug!(
            url = %self.config.url,
            model = body.model.unwrap_or("default"),
            message_count = body.messages.len(),
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.config.url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let info = parse_api_error(&body_text, status.as_u16());
            error!(
                status = status.as_u16(),
                retryable = info.retryable,
                message = %info.message,
                "chat endpoint error"
            );
            return Err(match status.as_u16() {
                429 => TransportError::RateLimited {
                    message: info.message,
                },
                402 => TransportError::QuotaExceeded {
                    message: info.message,
                },
                code => TransportError::Api {
                    status: code,
                    message: info.message,
                },
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        if !content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with(EVENT_STREAM))
        {
            warn!(content_type = ?content_type, "unexpected content type for streaming response");
        }

        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| TransportError::Stream {
                message: e.to_string(),
            })
        });

        Ok(ChatResponse {
            status: status.as_u16(),
            content_type,
            body: Box::pin(body),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(model: Option<&str>) -> HttpChatTransport {
        let config = HttpTransportConfig::new("http://localhost/v1/chat/completions")
            .with_api_key(Some("test-key".into()))
            .with_model(model.map(String::from));
        HttpChatTransport::new(config).unwrap()
    }

    #[test]
    fn system_prompt_compiled_in() {
        assert!(MEDICAL_SYSTEM_PROMPT.starts_with("You are MediAssist AI"));
        assert!(MEDICAL_SYSTEM_PROMPT.contains("EMERGENCY DETECTION"));
    }

    #[test]
    fn validate_rejects_empty_context() {
        let err = validate_context(&[]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidContext { .. }));
    }

    #[test]
    fn validate_rejects_trailing_assistant() {
        let context = vec![Message::user("hi"), Message::assistant("hello")];
        assert!(validate_context(&context).is_err());
        assert!(validate_context(&context[..1]).is_ok());
    }

    #[test]
    fn body_prepends_system_message() {
        let transport = transport(Some("google/gemini-2.5-flash"));
        let context = vec![
            Message::user("I have a headache"),
            Message::assistant("How long?"),
            Message::user("Two days"),
        ];
        let body = serde_json::to_value(transport.build_body(&context)).unwrap();
        assert_eq!(body["model"], "google/gemini-2.5-flash");
        assert_eq!(body["stream"], true);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "I have a headache");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "Two days");
    }

    #[test]
    fn body_omits_model_when_unset() {
        let body = serde_json::to_value(transport(None).build_body(&[Message::user("x")])).unwrap();
        assert!(body.get("model").is_none());
    }

    #[test]
    fn headers_include_bearer_token() {
        let headers = build_headers(Some("abc")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[ACCEPT], "text/event-stream");
    }

    #[test]
    fn headers_without_key_omit_authorization() {
        let headers = build_headers(None).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn invalid_key_is_config_error() {
        let err = build_headers(Some("bad\nkey")).unwrap_err();
        assert!(matches!(err, TransportError::Config { .. }));
    }

    #[test]
    fn custom_system_prompt() {
        let config = HttpTransportConfig::new("http://x").with_system_prompt("Be brief.");
        let transport = HttpChatTransport::new(config).unwrap();
        let body = serde_json::to_value(transport.build_body(&[Message::user("x")])).unwrap();
        assert_eq!(body["messages"][0]["content"], "Be brief.");
    }

    #[tokio::test]
    async fn invalid_context_makes_no_request() {
        // Nothing listens on this port; a request would fail with `Http`.
        let config = HttpTransportConfig::new("http://127.0.0.1:9/v1/chat/completions");
        let transport = HttpChatTransport::new(config).unwrap();
        let err = transport.send(&[]).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidContext { .. }));
    }
}
