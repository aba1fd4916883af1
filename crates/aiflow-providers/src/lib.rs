//! Model provider clients for aiflow
//!
//! Implements the [`ModelInvoker`] capability for each configured model kind:
//!
//! - Chat completion via any OpenAI-compatible endpoint
//! - Multi-turn reasoning via the Anthropic messages API
//! - Web-search-augmented retrieval via a search-grounded chat request
//!
//! Failures are classified for the orchestrator's retry policy: rate limits,
//! timeouts, and 5xx responses are transient; auth failures and malformed
//! requests are fatal. API keys are passed in as [`SecretString`] at
//! construction and never logged.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use aiflow_core::{InvocationError, InvokerRegistry, ModelInvoker, ModelKind, ModelParams};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

pub mod anthropic;
pub mod search;

pub use anthropic::*;
pub use search::*;

/// Configuration for the OpenAI-compatible client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API (e.g. "https://api.openai.com/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: SecretString,
    /// Model used when a step's parameters do not name one
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl ClientConfig {
    /// Create a config for the given key with the public OpenAI defaults
    pub fn openai(api_key: SecretString) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key,
            default_model: "gpt-3.5-turbo".to_string(),
            timeout_seconds: 60,
        }
    }
}

/// OpenAI-compatible chat completion client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: SecretString,
    http: reqwest::Client,
    default_model: String,
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// ID of the model to use
    pub model: String,
    /// List of messages in the conversation
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Content of the message
    pub content: String,
}

/// Role of the message author
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// List of generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Option<Usage>,
}

/// Generated choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Generated message
    pub message: Message,
    /// Reason for finishing (e.g. "stop", "length")
    #[serde(rename = "finish_reason")]
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(rename = "prompt_tokens")]
    pub prompt_tokens: i32,
    /// Tokens in the completion
    #[serde(rename = "completion_tokens")]
    pub completion_tokens: i32,
    /// Total tokens used
    #[serde(rename = "total_tokens")]
    pub total_tokens: i32,
}

/// API error response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Detailed error information
    pub error: ErrorDetail,
}

/// Detailed error information
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;

        info!(
            "Creating chat completion client for {}",
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

        let api_key_val =
            HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret()))
                .map_err(|e| InvocationError::fatal(format!("invalid API key characters: {e}")))?;

        headers.insert(header::AUTHORIZATION, api_key_val);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(headers)
    }

    /// Send a chat completion request
    #[instrument(skip(self, request))]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, InvocationError> {
        let url = join_endpoint(&self.base_url, "chat/completions")?;
        let headers = self.build_headers()?;

        debug!("Sending chat request to {}", url);

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
            let chat_response: ChatResponse = response
                .json()
                .await
                .map_err(|e| InvocationError::fatal(format!("malformed response body: {e}")))?;
            info!(
                "Chat completion successful: {} tokens used",
                chat_response
                    .usage
                    .as_ref()
                    .map(|u| u.total_tokens)
                    .unwrap_or(0)
            );
            Ok(chat_response)
        } else {
            let body = response.text().await.unwrap_or_default();
            // Log the full error for debugging but keep it out of the
            // user-facing message.
            error!("API error ({}): {}", status, body);
            Err(classify_status_error(status, &body))
        }
    }

    /// Send a single system + user exchange and return the first choice
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        params: &ModelParams,
    ) -> Result<String, InvocationError> {
        let request = ChatRequest {
            model: params
                .get_str("model")
                .unwrap_or(&self.default_model)
                .to_string(),
            messages: vec![
                Message {
                    role: Role::System,
                    content: system.to_string(),
                },
                Message {
                    role: Role::User,
                    content: user.to_string(),
                },
            ],
            temperature: params.get_f32("temperature"),
            max_tokens: params.get_u32("max_tokens"),
        };

        let response = self.chat(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| InvocationError::fatal("no response content"))
    }
}

#[async_trait]
impl ModelInvoker for OpenAiClient {
    async fn invoke(
        &self,
        prompt: &str,
        params: &ModelParams,
    ) -> Result<String, InvocationError> {
        self.complete("You are a helpful assistant.", prompt, params)
            .await
    }
}

/// Join an endpoint path onto a base URL without dropping its last segment.
///
/// `Url::join` replaces the final path segment unless the base ends with a
/// slash: "v1".join("chat") yields "chat", while "v1/".join("chat") yields
/// "v1/chat".
pub(crate) fn join_endpoint(base: &Url, endpoint: &str) -> Result<Url, InvocationError> {
    let joined = if base.path().ends_with('/') {
        base.join(endpoint)
    } else {
        let mut url_str = base.to_string();
        url_str.push('/');
        url_str.push_str(endpoint);
        Url::parse(&url_str)
    };
    joined.map_err(|e| InvocationError::fatal(format!("invalid endpoint URL: {e}")))
}

/// Classify a transport-level failure (no HTTP status available)
pub(crate) fn classify_transport_error(err: reqwest::Error) -> InvocationError {
    if err.is_timeout() || err.is_connect() {
        InvocationError::transient(format!("request failed: {err}"))
    } else {
        InvocationError::fatal(format!("request failed: {err}"))
    }
}

/// Classify an HTTP error status: 408/429/5xx are transient, the rest fatal
pub(crate) fn classify_status_error(status: StatusCode, body: &str) -> InvocationError {
    let detail = match serde_json::from_str::<ApiError>(body) {
        Ok(api_error) => sanitize_error_message(&api_error.error.message),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    let message = format!("HTTP {}: {}", status.as_u16(), detail);

    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        InvocationError::transient(message)
    } else {
        InvocationError::fatal(message)
    }
}

/// Sanitize provider error messages before they reach users or logs
pub(crate) fn sanitize_error_message(message: &str) -> String {
    let patterns = [
        (r"sk-[a-zA-Z0-9]{20,}", "sk-***"),
        (r"sk-ant-[a-zA-Z0-9-]{20,}", "sk-ant-***"),
        (r"Bearer [A-Za-z0-9._-]{16,}", "Bearer ***"),
        (r"[a-zA-Z0-9_-]{40,}", "***REDACTED***"),
    ];

    let mut sanitized = message.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            sanitized = re.replace_all(&sanitized, replacement).to_string();
        }
    }

    if sanitized.len() > 256 {
        format!("{}... [truncated]", &sanitized[..256])
    } else {
        sanitized
    }
}

/// Credentials loaded once at process start
///
/// Keys the process does not have simply leave their model kinds
/// unregistered; the engine reports a configuration error only when a
/// workflow actually requires the missing kind.
#[derive(Debug, Default)]
pub struct ProviderCredentials {
    /// Key for the OpenAI-compatible endpoint (chat + web search)
    pub openai_api_key: Option<SecretString>,
    /// Key for the Anthropic endpoint
    pub anthropic_api_key: Option<SecretString>,
}

/// Build the invoker registry for the supplied credentials.
pub fn build_registry(credentials: ProviderCredentials) -> anyhow::Result<InvokerRegistry> {
    let mut registry = InvokerRegistry::new();

    if let Some(key) = credentials.openai_api_key {
        let chat = Arc::new(OpenAiClient::new(ClientConfig::openai(key.clone()))?);
        registry.register(ModelKind::ChatGpt, chat);
        let search = Arc::new(WebSearchClient::new(ClientConfig {
            default_model: "gpt-4o".to_string(),
            ..ClientConfig::openai(key)
        })?);
        registry.register(ModelKind::WebSearch, search);
    }

    if let Some(key) = credentials.anthropic_api_key {
        let claude = Arc::new(AnthropicClient::new(AnthropicConfig::anthropic(key))?);
        registry.register(ModelKind::Claude, claude);
    }

    Ok(registry)
}
