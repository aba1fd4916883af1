//! The workflow engine
//!
//! Per payload the engine moves through resolving input, executing the
//! ordered step sequence with a fresh result context, and capturing a
//! [`WorkflowResult`]. Directory inputs with the `individual` strategy fan
//! out into independent sub-runs; one payload's failure never aborts its
//! siblings. Steps run strictly in sequence because each prompt may depend on
//! an earlier step's output.

use crate::config;
use crate::input::{self, Payload};
use crate::invoke::InvokerRegistry;
use crate::models::{ResultContext, RunSummary, WorkflowConfig, WorkflowResult};
use crate::retry::RetryPolicy;
use crate::step::StepExecutor;
use crate::Result;
use chrono::Utc;
use tracing::{info, instrument, warn};

/// Orchestrates workflow runs over a set of registered model invokers
pub struct WorkflowEngine {
    invokers: InvokerRegistry,
    retry: RetryPolicy,
}

impl WorkflowEngine {
    /// Create an engine over the given invoker registry with the default
    /// retry policy
    pub fn new(invokers: InvokerRegistry) -> Self {
        Self {
            invokers,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run a workflow to completion.
    ///
    /// Returns one [`WorkflowResult`] per payload. Input resolution failure
    /// aborts the whole run; a step failure is recorded on its payload's
    /// result (with the failing step and attempts in the trace) and, for
    /// directory fan-out, leaves sibling payloads unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FlowError::Config`] for invalid configurations and
    /// [`crate::FlowError::Input`] when no payload can be resolved.
    #[instrument(skip(self, config), fields(workflow = %config.name))]
    pub async fn run(&self, config: &WorkflowConfig) -> Result<RunSummary> {
        config::validate(config)?;

        let mut summary = RunSummary::new(config.name.clone());
        info!(run_id = %summary.run_id, "Starting workflow run");

        let payloads = input::resolve(&config.input)?;
        info!(payloads = payloads.len(), "Input resolved");

        for payload in payloads {
            let result = self.run_payload(config, payload).await;
            if let Some(error) = &result.error {
                warn!(
                    source = %result.input_source,
                    error = %error,
                    "Payload failed"
                );
            }
            summary.results.push(result);
        }

        summary.ended = Some(Utc::now());
        info!(
            run_id = %summary.run_id,
            succeeded = summary.succeeded(),
            "Workflow run finished"
        );
        Ok(summary)
    }

    /// Run the full step sequence over one payload with a fresh context.
    async fn run_payload(&self, config: &WorkflowConfig, payload: Payload) -> WorkflowResult {
        let mut context = ResultContext::seeded(payload.text);
        let executor = StepExecutor::new(&self.invokers, &self.retry);

        let mut trace = Vec::with_capacity(config.steps.len());
        let mut final_output = String::new();

        for step in &config.steps {
            match executor.execute(step, &mut context).await {
                Ok(result) => {
                    final_output = result.output.clone();
                    trace.push(result);
                }
                Err(failure) => {
                    // A failed step's output cannot be referenced by later
                    // templates; abort the remaining steps for this payload.
                    let message = failure.error.to_string();
                    trace.push(failure.result);
                    return WorkflowResult {
                        final_output: String::new(),
                        step_trace: trace,
                        input_source: payload.source,
                        error: Some(message),
                    };
                }
            }
        }

        WorkflowResult {
            final_output,
            step_trace: trace,
            input_source: payload.source,
            error: None,
        }
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("invokers", &self.invokers)
            .field("retry", &self.retry)
            .finish()
    }
}
