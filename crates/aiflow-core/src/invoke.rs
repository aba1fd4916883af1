//! The model-invocation capability contract
//!
//! The engine treats chat-completion, multi-turn reasoning, and web search
//! uniformly through [`ModelInvoker`]; it never inspects provider-specific
//! response shapes. Concrete clients live in `aiflow-providers`.

use crate::models::{ModelKind, ModelParams};
use crate::{FlowError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Classified failure from a model invocation
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct InvocationError {
    /// Human-readable failure description
    pub message: String,
    /// Whether a retry is expected to succeed (rate limit, timeout, 5xx)
    pub transient: bool,
}

impl InvocationError {
    /// A failure expected to succeed on retry
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    /// A failure that must propagate immediately (bad credentials, malformed request)
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

/// A model-invocation capability
///
/// One operation: prompt text plus an opaque parameter map in, response text
/// or a classified error out.
#[async_trait]
pub trait ModelInvoker: Send + Sync + std::fmt::Debug {
    /// Invoke the capability with a fully resolved prompt.
    async fn invoke(
        &self,
        prompt: &str,
        params: &ModelParams,
    ) -> std::result::Result<String, InvocationError>;
}

/// Registry mapping each [`ModelKind`] to its invoker
#[derive(Clone, Default)]
pub struct InvokerRegistry {
    invokers: HashMap<ModelKind, Arc<dyn ModelInvoker>>,
}

impl InvokerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the invoker for a model kind, replacing any previous one
    pub fn register(&mut self, kind: ModelKind, invoker: Arc<dyn ModelInvoker>) {
        self.invokers.insert(kind, invoker);
    }

    /// Builder-style variant of [`InvokerRegistry::register`]
    pub fn with(mut self, kind: ModelKind, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.register(kind, invoker);
        self
    }

    /// Look up the invoker for a model kind.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Config`] when no invoker is registered for the
    /// kind, typically because the provider's credentials were not supplied.
    pub fn get(&self, kind: ModelKind) -> Result<&Arc<dyn ModelInvoker>> {
        self.invokers.get(&kind).ok_or_else(|| {
            FlowError::Config(format!("no invoker registered for model kind '{kind}'"))
        })
    }

    /// Kinds with a registered invoker
    pub fn kinds(&self) -> Vec<ModelKind> {
        self.invokers.keys().copied().collect()
    }
}

impl std::fmt::Debug for InvokerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
