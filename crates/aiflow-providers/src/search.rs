//! Web-search-augmented retrieval
//!
//! Wraps the chat completion client with a search-grounded system
//! instruction, so the orchestrator can treat web search as just another
//! model kind behind the same capability contract.

use crate::{ClientConfig, OpenAiClient};
use aiflow_core::{InvocationError, ModelInvoker, ModelParams};
use async_trait::async_trait;
use tracing::info;

const SEARCH_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to web search. \
                                    When answering, always cite your sources with URLs.";

/// Web-search invoker backed by a search-capable chat model
#[derive(Debug, Clone)]
pub struct WebSearchClient {
    inner: OpenAiClient,
}

impl WebSearchClient {
    /// Create a new web search client
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        Ok(Self {
            inner: OpenAiClient::new(config)?,
        })
    }
}

#[async_trait]
impl ModelInvoker for WebSearchClient {
    async fn invoke(
        &self,
        prompt: &str,
        params: &ModelParams,
    ) -> Result<String, InvocationError> {
        if prompt.trim().is_empty() {
            return Err(InvocationError::fatal("empty search query"));
        }

        info!(query_len = prompt.len(), "Performing web search");

        let user = format!("Search the web for information about: {prompt}");
        self.inner
            .complete(SEARCH_SYSTEM_PROMPT, &user, params)
            .await
    }
}
