//! Data models for aiflow workflows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A parsed workflow configuration
///
/// Immutable once loaded. Step names are unique within a configuration, and a
/// step's prompt template may only reference `input` or the name of a step
/// that appears strictly earlier in the sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name, used in run summaries and output footers
    pub name: String,
    /// Optional human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Where the input text comes from
    pub input: InputSpec,
    /// Ordered step sequence
    pub steps: Vec<StepSpec>,
    /// Where and how results are written
    #[serde(default)]
    pub output: OutputSpec,
}

/// Input source for a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputSpec {
    /// Literal text supplied inline
    Text {
        /// The input text
        value: String,
    },
    /// A single file read in full
    File {
        /// Path to the input file
        path: String,
    },
    /// A directory of files matched by a glob pattern
    Directory {
        /// Directory to enumerate
        path: String,
        /// Glob pattern matched against file names
        #[serde(default = "default_file_pattern")]
        file_pattern: String,
        /// Whether to descend into subdirectories
        #[serde(default)]
        recursive: bool,
        /// How matched files are turned into payloads
        #[serde(default)]
        processing_strategy: ProcessingStrategy,
    },
}

fn default_file_pattern() -> String {
    "*".to_string()
}

/// Directory-input policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStrategy {
    /// One independent run of the full step sequence per matched file
    #[default]
    Individual,
    /// All matched files joined into a single payload
    Concatenate,
}

/// One configured invocation of a model capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Unique key for this step; later templates reference it by this name
    pub name: String,
    /// Which model capability this step invokes
    pub model: ModelKind,
    /// Opaque parameters forwarded verbatim to the invocation capability
    #[serde(default)]
    pub model_params: ModelParams,
    /// Prompt template with `{placeholder}` or `{placeholder.output}` tokens
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

fn default_prompt_template() -> String {
    "{input}".to_string()
}

/// Model capability variants
///
/// `claude-first` is not a kind: it is an engine policy that synthesizes a
/// two-step plan over the `Claude` and `ChatGpt` kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Chat-completion capability
    #[serde(rename = "chatgpt")]
    ChatGpt,
    /// Multi-turn reasoning capability
    Claude,
    /// Web-search-augmented retrieval capability
    WebSearch,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::ChatGpt => write!(f, "chatgpt"),
            ModelKind::Claude => write!(f, "claude"),
            ModelKind::WebSearch => write!(f, "web_search"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = crate::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chatgpt" => Ok(ModelKind::ChatGpt),
            "claude" => Ok(ModelKind::Claude),
            "web_search" => Ok(ModelKind::WebSearch),
            other => Err(crate::FlowError::Config(format!(
                "unknown model kind: {other}"
            ))),
        }
    }
}

/// Opaque model parameters forwarded verbatim to the invocation capability
///
/// Providers extract the keys they understand (`model`, `max_tokens`,
/// `temperature`) and apply their own defaults for the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParams(HashMap<String, serde_json::Value>);

impl ModelParams {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`ModelParams::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a string parameter
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Look up an unsigned integer parameter
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.0.get(key).and_then(|v| v.as_u64()).map(|v| v as u32)
    }

    /// Look up a float parameter
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.0.get(key).and_then(|v| v.as_f64()).map(|v| v as f32)
    }

    /// Whether no parameters are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Output sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Sink target (console or file)
    #[serde(rename = "type", default)]
    pub target: OutputTarget,
    /// Destination path when the target is a file
    #[serde(default)]
    pub path: Option<String>,
    /// Rendering format for the sink
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            target: OutputTarget::Console,
            path: None,
            format: OutputFormat::Text,
        }
    }
}

/// Output sink target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    /// Print to the console
    #[default]
    Console,
    /// Write to a file
    File,
}

/// Rendering format for workflow output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Plain text
    #[default]
    Text,
    /// Markdown document
    Markdown,
    /// Pretty-printed JSON
    Json,
    /// Standalone HTML document
    Html,
}

/// The accumulating mapping from logical name to produced text
///
/// Seeded with `input`, growing by one entry per completed step. Created
/// fresh per payload and never shared between executions.
#[derive(Debug, Clone, Default)]
pub struct ResultContext(HashMap<String, String>);

impl ResultContext {
    /// Create a context seeded with the resolved input text
    pub fn seeded(input: impl Into<String>) -> Self {
        let mut map = HashMap::new();
        map.insert("input".to_string(), input.into());
        Self(map)
    }

    /// Look up a named entry
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Record a completed step's output under its name
    pub fn insert(&mut self, name: impl Into<String>, output: impl Into<String>) {
        self.0.insert(name.into(), output.into());
    }

    /// Whether a name is present in the context
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// The step's configured name
    pub step_name: String,
    /// Produced text; empty when the step failed
    pub output: String,
    /// Wall-clock duration of the step in milliseconds
    pub duration_ms: u64,
    /// Invocation attempts consumed, including the successful one
    pub attempts: u32,
    /// Whether the step produced an output
    pub succeeded: bool,
}

/// Result of running the full step sequence over one payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// The last step's output, or empty when the payload failed
    pub final_output: String,
    /// Ordered trace of executed steps
    pub step_trace: Vec<StepResult>,
    /// Which file or text produced this result
    pub input_source: String,
    /// Last error message when the payload failed
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkflowResult {
    /// Whether every step of this payload completed
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Top-level metadata and results for one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique identifier for this run
    pub run_id: String,
    /// Name of the executed workflow
    pub workflow_name: String,
    /// When the run started
    pub started: DateTime<Utc>,
    /// When the run ended
    pub ended: Option<DateTime<Utc>>,
    /// One result per payload (one for text/file/concatenate inputs)
    pub results: Vec<WorkflowResult>,
}

impl RunSummary {
    /// Creates a new RunSummary for the given workflow name
    pub fn new(workflow_name: impl Into<String>) -> Self {
        let now = Utc::now();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        let run_id = format!("{}_{}", now.format("%Y-%m-%dT%H-%M-%SZ"), uuid_short);

        Self {
            run_id,
            workflow_name: workflow_name.into(),
            started: now,
            ended: None,
            results: Vec::new(),
        }
    }

    /// Whether every payload completed successfully
    pub fn succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(WorkflowResult::succeeded)
    }
}
