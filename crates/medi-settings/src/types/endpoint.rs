//! Chat-completion endpoint settings.

use serde::{Deserialize, Serialize};

/// Where and how chat requests are sent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// Full URL of the chat-completion endpoint.
    pub url: String,
    /// Model identifier sent in the request body. Omitted when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    /// Replacement for the compiled-in system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            url: "https://ai.gateway.lovable.dev/v1/chat/completions".to_string(),
            model: Some("google/gemini-2.5-flash".to_string()),
            api_key_env: "AI_API_KEY".to_string(),
            system_prompt: None,
        }
    }
}

impl EndpointSettings {
    /// Read the bearer token from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|v| !v.is_empty())
    }
}
