//! Single-step execution
//!
//! A step resolves its prompt against the current result context, invokes its
//! model capability under the retry policy, and records the named output back
//! into the context for later steps to reference.

use crate::invoke::InvokerRegistry;
use crate::models::{ResultContext, StepResult, StepSpec};
use crate::retry::RetryPolicy;
use crate::template;
use crate::FlowError;
use std::time::Instant;
use tracing::{info, instrument};

/// A failed step: the trace entry plus the error that aborts the payload
#[derive(Debug)]
pub struct StepFailure {
    /// Trace entry with `succeeded = false` and the consumed attempt count
    pub result: StepResult,
    /// The error to attach to the payload's workflow result
    pub error: FlowError,
}

/// Executes one configured step at a time
pub struct StepExecutor<'a> {
    invokers: &'a InvokerRegistry,
    retry: &'a RetryPolicy,
}

impl<'a> StepExecutor<'a> {
    /// Create an executor over the given invokers and retry policy
    pub fn new(invokers: &'a InvokerRegistry, retry: &'a RetryPolicy) -> Self {
        Self { invokers, retry }
    }

    /// Execute `step`, inserting `context[step.name] = output` on success.
    ///
    /// Template resolution failures are fatal for the payload and consume no
    /// invocation attempt. Invocation failures carry the attempts consumed by
    /// the retry policy. Either way the returned trace entry records what
    /// happened, so a failed run can report which step failed and how many
    /// attempts it used.
    #[instrument(skip(self, step, context), fields(step = %step.name, model = %step.model))]
    pub async fn execute(
        &self,
        step: &StepSpec,
        context: &mut ResultContext,
    ) -> std::result::Result<StepResult, StepFailure> {
        let started = Instant::now();

        let prompt = match template::render(&step.prompt_template, context) {
            Ok(prompt) => prompt,
            Err(error) => {
                return Err(StepFailure {
                    result: failed_result(step, started, 0),
                    error,
                });
            }
        };

        let invoker = match self.invokers.get(step.model) {
            Ok(invoker) => invoker,
            Err(error) => {
                return Err(StepFailure {
                    result: failed_result(step, started, 0),
                    error,
                });
            }
        };

        info!(prompt_len = prompt.len(), "Executing step");

        let (outcome, attempts) = self
            .retry
            .run(|| invoker.invoke(&prompt, &step.model_params))
            .await;

        match outcome {
            Ok(output) => {
                let result = StepResult {
                    step_name: step.name.clone(),
                    output: output.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    attempts,
                    succeeded: true,
                };
                context.insert(step.name.clone(), output);
                info!(
                    duration_ms = result.duration_ms,
                    attempts, "Step completed"
                );
                Ok(result)
            }
            Err(err) => Err(StepFailure {
                result: failed_result(step, started, attempts),
                error: FlowError::Invocation {
                    message: err.message,
                    transient: err.transient,
                    attempts,
                },
            }),
        }
    }
}

fn failed_result(step: &StepSpec, started: Instant, attempts: u32) -> StepResult {
    StepResult {
        step_name: step.name.clone(),
        output: String::new(),
        duration_ms: started.elapsed().as_millis() as u64,
        attempts,
        succeeded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::{InvocationError, ModelInvoker};
    use crate::models::{ModelKind, ModelParams};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl ModelInvoker for Echo {
        async fn invoke(
            &self,
            prompt: &str,
            _params: &ModelParams,
        ) -> std::result::Result<String, InvocationError> {
            Ok(prompt.to_string())
        }
    }

    #[derive(Debug)]
    struct AlwaysDown(Arc<AtomicU32>);

    #[async_trait]
    impl ModelInvoker for AlwaysDown {
        async fn invoke(
            &self,
            _prompt: &str,
            _params: &ModelParams,
        ) -> std::result::Result<String, InvocationError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(InvocationError::transient("503 service unavailable"))
        }
    }

    fn spec(name: &str, template: &str) -> StepSpec {
        StepSpec {
            name: name.to_string(),
            model: ModelKind::ChatGpt,
            model_params: ModelParams::new(),
            prompt_template: template.to_string(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn successful_step_updates_context() {
        let registry = InvokerRegistry::new().with(ModelKind::ChatGpt, Arc::new(Echo));
        let retry = fast_retry();
        let executor = StepExecutor::new(&registry, &retry);
        let mut ctx = ResultContext::seeded("X");

        let result = executor.execute(&spec("s1", "{input}"), &mut ctx).await.unwrap();

        assert!(result.succeeded);
        assert_eq!(result.output, "X");
        assert_eq!(result.attempts, 1);
        assert_eq!(ctx.get("s1"), Some("X"));
    }

    #[tokio::test]
    async fn template_failure_skips_invocation() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry =
            InvokerRegistry::new().with(ModelKind::ChatGpt, Arc::new(AlwaysDown(calls.clone())));
        let retry = fast_retry();
        let executor = StepExecutor::new(&registry, &retry);
        let mut ctx = ResultContext::seeded("X");

        let failure = executor
            .execute(&spec("s2", "{missing.output}"), &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, FlowError::Template { .. }));
        assert_eq!(failure.result.attempts, 0);
        assert!(!failure.result.succeeded);
        // No invocation capability call occurred.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!ctx.contains("s2"));
    }

    #[tokio::test]
    async fn exhausted_retries_mark_step_failed_with_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry =
            InvokerRegistry::new().with(ModelKind::ChatGpt, Arc::new(AlwaysDown(calls.clone())));
        let retry = fast_retry();
        let executor = StepExecutor::new(&registry, &retry);
        let mut ctx = ResultContext::seeded("X");

        let failure = executor.execute(&spec("s1", "{input}"), &mut ctx).await.unwrap_err();

        assert_eq!(failure.result.attempts, 3);
        assert!(failure.result.output.is_empty());
        match failure.error {
            FlowError::Invocation { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        // A failed step's output cannot be referenced by later templates.
        assert!(!ctx.contains("s1"));
    }
}
