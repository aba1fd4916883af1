//! Anthropic messages client
//!
//! Implements the multi-turn reasoning capability against the Anthropic
//! messages API. The wire shape differs from the OpenAI dialect (`x-api-key`
//! auth, content blocks in the response) but the classification contract is
//! the same: 429/5xx/timeouts retryable, auth and request errors fatal.

use crate::{classify_status_error, classify_transport_error, join_endpoint};
use aiflow_core::{InvocationError, ModelInvoker, ModelParams};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Base URL for the API (e.g. "https://api.anthropic.com")
    pub base_url: String,
    /// API key for authentication
    pub api_key: SecretString,
    /// Model used when a step's parameters do not name one
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl AnthropicConfig {
    /// Create a config for the given key with the public Anthropic defaults
    pub fn anthropic(api_key: SecretString) -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key,
            default_model: "claude-3-sonnet-20240229".to_string(),
            timeout_seconds: 60,
        }
    }
}

/// Anthropic messages API client
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    base_url: Url,
    api_key: SecretString,
    http: reqwest::Client,
    default_model: String,
}

/// Messages API request
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// ID of the model to use
    pub model: String,
    /// Maximum number of tokens to generate (required by the API)
    pub max_tokens: u32,
    /// Sampling temperature (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Conversation turns
    pub messages: Vec<TurnMessage>,
}

/// One conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    /// "user" or "assistant"
    pub role: String,
    /// Turn content
    pub content: String,
}

/// Messages API response
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    /// Generated content blocks
    pub content: Vec<ContentBlock>,
    /// Token usage statistics
    pub usage: Option<AnthropicUsage>,
}

/// One block of generated content
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    /// Block type (e.g. "text")
    #[serde(rename = "type")]
    pub block_type: String,
    /// Text for text blocks
    #[serde(default)]
    pub text: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicUsage {
    /// Tokens in the prompt
    pub input_tokens: i32,
    /// Tokens in the completion
    pub output_tokens: i32,
}

impl AnthropicClient {
    /// Create a new client
    pub fn new(config: AnthropicConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;

        info!(
            "Creating Anthropic client for {}",
            base_url.domain().unwrap_or("unknown")
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url,
            api_key: config.api_key,
            http,
            default_model: config.default_model,
        })
    }

    /// Get the default model configured for this client
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn build_headers(&self) -> Result<HeaderMap, InvocationError> {
        let mut headers = HeaderMap::new();

        let api_key_val = HeaderValue::from_str(self.api_key.expose_secret())
            .map_err(|e| InvocationError::fatal(format!("invalid API key characters: {e}")))?;

        headers.insert("x-api-key", api_key_val);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    /// Send a messages request
    #[instrument(skip(self, request))]
    pub async fn messages(
        &self,
        request: MessagesRequest,
    ) -> Result<MessagesResponse, InvocationError> {
        let url = join_endpoint(&self.base_url, "v1/messages")?;
        let headers = self.build_headers()?;

        debug!("Sending messages request to {}", url);

        let response = self
            .http
            .post(url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();

        if status.is_success() {
            let messages_response: MessagesResponse = response
                .json()
                .await
                .map_err(|e| InvocationError::fatal(format!("malformed response body: {e}")))?;
            info!(
                "Messages request successful: {} output tokens",
                messages_response
                    .usage
                    .as_ref()
                    .map(|u| u.output_tokens)
                    .unwrap_or(0)
            );
            Ok(messages_response)
        } else {
            let body = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, body);
            Err(classify_status_error(status, &body))
        }
    }
}

#[async_trait]
impl ModelInvoker for AnthropicClient {
    async fn invoke(
        &self,
        prompt: &str,
        params: &ModelParams,
    ) -> Result<String, InvocationError> {
        let request = MessagesRequest {
            model: params
                .get_str("model")
                .unwrap_or(&self.default_model)
                .to_string(),
            max_tokens: params.get_u32("max_tokens").unwrap_or(1000),
            temperature: params.get_f32("temperature"),
            messages: vec![TurnMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self.messages(request).await?;

        let text: String = response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(InvocationError::fatal("no response content"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_config_defaults() {
        let config = AnthropicConfig::anthropic(SecretString::new("test".into()));
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.default_model, "claude-3-sonnet-20240229");
    }

    #[test]
    fn request_omits_unset_temperature() {
        let request = MessagesRequest {
            model: "claude-3-sonnet-20240229".to_string(),
            max_tokens: 100,
            temperature: None,
            messages: vec![TurnMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("temperature"));
        assert!(json.contains("\"max_tokens\":100"));
    }
}
