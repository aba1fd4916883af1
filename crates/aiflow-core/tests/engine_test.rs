use aiflow_core::{
    synthesize_legacy_steps, FlowError, InputSpec, InvocationError, InvokerRegistry, LegacyModel,
    ModelInvoker, ModelKind, ModelParams, OutputSpec, ProcessingStrategy, RetryPolicy, StepSpec,
    WorkflowConfig, WorkflowEngine,
};
use async_trait::async_trait;
use std::fs;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Echoes its resolved prompt verbatim and counts invocations.
#[derive(Debug)]
struct EchoInvoker {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl ModelInvoker for EchoInvoker {
    async fn invoke(
        &self,
        prompt: &str,
        _params: &ModelParams,
    ) -> Result<String, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(prompt.to_string())
    }
}

/// Fails fatally whenever the prompt contains the poison marker.
#[derive(Debug)]
struct PoisonInvoker;

#[async_trait]
impl ModelInvoker for PoisonInvoker {
    async fn invoke(
        &self,
        prompt: &str,
        _params: &ModelParams,
    ) -> Result<String, InvocationError> {
        if prompt.contains("POISON") {
            Err(InvocationError::fatal("refused"))
        } else {
            Ok(format!("ok:{prompt}"))
        }
    }
}

fn echo_registry() -> (InvokerRegistry, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let invoker = Arc::new(EchoInvoker {
        calls: calls.clone(),
    });
    let registry = InvokerRegistry::new()
        .with(ModelKind::ChatGpt, invoker.clone())
        .with(ModelKind::Claude, invoker.clone())
        .with(ModelKind::WebSearch, invoker);
    (registry, calls)
}

fn step(name: &str, template: &str) -> StepSpec {
    StepSpec {
        name: name.to_string(),
        model: ModelKind::ChatGpt,
        model_params: ModelParams::new(),
        prompt_template: template.to_string(),
    }
}

fn text_config(value: &str, steps: Vec<StepSpec>) -> WorkflowConfig {
    WorkflowConfig {
        name: "test".to_string(),
        description: None,
        input: InputSpec::Text {
            value: value.to_string(),
        },
        steps,
        output: OutputSpec::default(),
    }
}

fn fast_engine(registry: InvokerRegistry) -> WorkflowEngine {
    WorkflowEngine::new(registry).with_retry_policy(RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
    })
}

#[tokio::test]
async fn single_step_echo_returns_input() {
    let (registry, _) = echo_registry();
    let engine = fast_engine(registry);
    let config = text_config("X", vec![step("s1", "{input}")]);

    let summary = engine.run(&config).await.unwrap();

    assert!(summary.succeeded());
    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].final_output, "X");
    assert_eq!(summary.results[0].input_source, "inline");
    assert!(summary.ended.is_some());
}

#[tokio::test]
async fn second_step_sees_first_step_output() {
    let (registry, _) = echo_registry();
    let engine = fast_engine(registry);
    let config = text_config("A", vec![step("s1", "{input}"), step("s2", "{s1.output}!")]);

    let summary = engine.run(&config).await.unwrap();
    let result = &summary.results[0];

    assert_eq!(result.step_trace[0].output, "A");
    assert_eq!(result.final_output, "A!");
    assert_eq!(result.step_trace.len(), 2);
    assert!(result.step_trace.iter().all(|s| s.succeeded));
}

#[tokio::test]
async fn execution_order_follows_configuration_order() {
    let (registry, _) = echo_registry();
    let engine = fast_engine(registry);
    let config = text_config(
        "seed",
        vec![
            step("first", "{input}-1"),
            step("second", "{first.output}-2"),
            step("third", "{second.output}-3"),
        ],
    );

    let summary = engine.run(&config).await.unwrap();
    let trace = &summary.results[0].step_trace;

    assert_eq!(trace[0].step_name, "first");
    assert_eq!(trace[1].step_name, "second");
    assert_eq!(trace[2].step_name, "third");
    assert_eq!(summary.results[0].final_output, "seed-1-2-3");
}

#[tokio::test]
async fn forward_reference_fails_without_invoking() {
    let (registry, calls) = echo_registry();
    let engine = fast_engine(registry);
    let config = text_config("X", vec![step("s1", "{later.output}"), step("later", "{input}")]);

    let summary = engine.run(&config).await.unwrap();
    let result = &summary.results[0];

    assert!(!result.succeeded());
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("later"), "error should name the missing key: {error}");
    // The failing step consumed no invocation, and later steps never ran.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.step_trace.len(), 1);
    assert!(!result.step_trace[0].succeeded);
}

#[tokio::test]
async fn empty_step_sequence_is_a_config_error() {
    let (registry, _) = echo_registry();
    let engine = fast_engine(registry);
    let config = text_config("X", vec![]);

    let err = engine.run(&config).await.unwrap_err();
    assert!(matches!(err, FlowError::Config(_)));
}

#[tokio::test]
async fn missing_input_aborts_the_whole_run() {
    let (registry, calls) = echo_registry();
    let engine = fast_engine(registry);
    let config = WorkflowConfig {
        input: InputSpec::File {
            path: "/nonexistent/input.txt".to_string(),
        },
        ..text_config("", vec![step("s1", "{input}")])
    };

    let err = engine.run(&config).await.unwrap_err();
    assert!(matches!(err, FlowError::Input(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn individual_strategy_produces_one_result_per_file() {
    let dir = TempDir::new().unwrap();
    for (name, content) in [("a.txt", "alpha"), ("b.txt", "beta"), ("c.txt", "gamma")] {
        fs::write(dir.path().join(name), content).unwrap();
    }

    let (registry, _) = echo_registry();
    let engine = fast_engine(registry);
    let config = WorkflowConfig {
        input: InputSpec::Directory {
            path: dir.path().display().to_string(),
            file_pattern: "*.txt".to_string(),
            recursive: false,
            processing_strategy: ProcessingStrategy::Individual,
        },
        ..text_config("", vec![step("s1", "{input}")])
    };

    let summary = engine.run(&config).await.unwrap();

    assert_eq!(summary.results.len(), 3);
    let outputs: Vec<&str> = summary
        .results
        .iter()
        .map(|r| r.final_output.as_str())
        .collect();
    assert_eq!(outputs, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn one_payload_failure_leaves_siblings_unaffected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "fine").unwrap();
    fs::write(dir.path().join("b.txt"), "has POISON inside").unwrap();
    fs::write(dir.path().join("c.txt"), "also fine").unwrap();

    let registry = InvokerRegistry::new().with(ModelKind::ChatGpt, Arc::new(PoisonInvoker));
    let engine = fast_engine(registry);
    let config = WorkflowConfig {
        input: InputSpec::Directory {
            path: dir.path().display().to_string(),
            file_pattern: "*.txt".to_string(),
            recursive: false,
            processing_strategy: ProcessingStrategy::Individual,
        },
        ..text_config("", vec![step("s1", "{input}")])
    };

    let summary = engine.run(&config).await.unwrap();

    assert_eq!(summary.results.len(), 3);
    assert!(summary.results[0].succeeded());
    assert!(!summary.results[1].succeeded());
    assert!(summary.results[2].succeeded());
    assert_eq!(summary.results[0].final_output, "ok:fine");
    assert_eq!(summary.results[2].final_output, "ok:also fine");
    assert!(!summary.succeeded());
}

#[tokio::test]
async fn concatenate_strategy_produces_one_joined_result() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("one.txt"), "first part").unwrap();
    fs::write(dir.path().join("two.txt"), "second part").unwrap();

    let (registry, calls) = echo_registry();
    let engine = fast_engine(registry);
    let config = WorkflowConfig {
        input: InputSpec::Directory {
            path: dir.path().display().to_string(),
            file_pattern: "*.txt".to_string(),
            recursive: false,
            processing_strategy: ProcessingStrategy::Concatenate,
        },
        ..text_config("", vec![step("s1", "{input}")])
    };

    let summary = engine.run(&config).await.unwrap();

    assert_eq!(summary.results.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let result = &summary.results[0];
    assert_eq!(result.input_source, "concatenated:2 files");
    assert!(result.final_output.contains("first part"));
    assert!(result.final_output.contains("second part"));
    let one_at = result.final_output.find("first part").unwrap();
    let two_at = result.final_output.find("second part").unwrap();
    assert!(one_at < two_at);
}

#[tokio::test]
async fn claude_first_plan_runs_through_the_same_path() {
    let (registry, calls) = echo_registry();
    let engine = fast_engine(registry);
    let config = text_config(
        "raw question",
        synthesize_legacy_steps(LegacyModel::ClaudeFirst, 1000, 0.7),
    );

    let summary = engine.run(&config).await.unwrap();
    let result = &summary.results[0];

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.step_trace[0].step_name, "claude_analysis");
    assert_eq!(result.step_trace[0].output, "raw question");
    assert_eq!(result.step_trace[1].step_name, "chatgpt_refinement");
    assert!(result
        .final_output
        .starts_with("Here's an analysis from another AI assistant: raw question"));
}

#[tokio::test]
async fn failed_step_reports_attempts_in_trace() {
    #[derive(Debug)]
    struct AlwaysRateLimited;

    #[async_trait]
    impl ModelInvoker for AlwaysRateLimited {
        async fn invoke(
            &self,
            _prompt: &str,
            _params: &ModelParams,
        ) -> Result<String, InvocationError> {
            Err(InvocationError::transient("429 too many requests"))
        }
    }

    let registry = InvokerRegistry::new().with(ModelKind::ChatGpt, Arc::new(AlwaysRateLimited));
    let engine = fast_engine(registry);
    let config = text_config("X", vec![step("s1", "{input}"), step("s2", "{s1.output}")]);

    let summary = engine.run(&config).await.unwrap();
    let result = &summary.results[0];

    assert!(!result.succeeded());
    // Only the failed step is in the trace; s2 never started.
    assert_eq!(result.step_trace.len(), 1);
    assert_eq!(result.step_trace[0].attempts, 3);
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("3 attempt"));
    assert!(error.contains("429"));
}
