//! Configuration loading, normalization, and validation
//!
//! Two configuration dialects exist: the canonical `steps` list and the older
//! `ai_models` list (`{name, task, prompt_template, parameters}`, where
//! `name` is the model kind). Both normalize into one [`StepSpec`] sequence
//! at load time so the engine has exactly one execution path. Unknown fields
//! are ignored.

use crate::models::{
    InputSpec, ModelKind, ModelParams, OutputSpec, StepSpec, WorkflowConfig,
};
use crate::{FlowError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Raw on-disk configuration shape, before dialect normalization
#[derive(Debug, Deserialize)]
struct RawConfig {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    input: InputSpec,
    #[serde(default)]
    steps: Option<Vec<StepSpec>>,
    #[serde(default)]
    ai_models: Option<Vec<LegacyModelEntry>>,
    #[serde(default)]
    output: Option<OutputSpec>,
}

/// Entry in the older `ai_models` step-list dialect
#[derive(Debug, Deserialize)]
struct LegacyModelEntry {
    /// The model kind, not a unique step identifier
    name: String,
    #[serde(default)]
    #[allow(dead_code)]
    task: Option<String>,
    #[serde(default)]
    prompt_template: Option<String>,
    #[serde(default)]
    parameters: Option<ModelParams>,
}

/// Load a workflow configuration from a JSON file.
///
/// # Errors
///
/// Returns [`FlowError::Config`] when the file is missing, is not valid JSON,
/// or fails validation after normalization.
pub fn load_config(path: impl AsRef<Path>) -> Result<WorkflowConfig> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(FlowError::Config(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }

    let raw = std::fs::read_to_string(path)?;
    let parsed: RawConfig = serde_json::from_str(&raw).map_err(|e| {
        FlowError::Config(format!("invalid JSON in {}: {e}", path.display()))
    })?;

    let config = normalize(parsed)?;
    validate(&config)?;

    info!(path = %path.display(), steps = config.steps.len(), "Loaded workflow configuration");
    Ok(config)
}

fn normalize(raw: RawConfig) -> Result<WorkflowConfig> {
    let steps = match (raw.steps, raw.ai_models) {
        (Some(steps), _) => steps,
        (None, Some(models)) => normalize_ai_models(models)?,
        (None, None) => {
            return Err(FlowError::Config(
                "configuration defines neither 'steps' nor 'ai_models'".to_string(),
            ));
        }
    };

    Ok(WorkflowConfig {
        name: raw.name.unwrap_or_else(|| "workflow".to_string()),
        description: raw.description,
        input: raw.input,
        steps,
        output: raw.output.unwrap_or_default(),
    })
}

/// Normalize the `ai_models` dialect into the canonical step sequence.
///
/// The legacy `name` is the model kind, so unique step keys are synthesized
/// as `"<name>_<index>"` to satisfy the uniqueness invariant.
fn normalize_ai_models(models: Vec<LegacyModelEntry>) -> Result<Vec<StepSpec>> {
    models
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let model: ModelKind = entry.name.parse()?;
            Ok(StepSpec {
                name: format!("{}_{index}", entry.name),
                model,
                model_params: entry.parameters.unwrap_or_default(),
                prompt_template: entry
                    .prompt_template
                    .unwrap_or_else(|| "{input}".to_string()),
            })
        })
        .collect()
}

/// Validate structural invariants of a workflow configuration.
///
/// Checks a non-empty step sequence and unique step names (`input` is
/// reserved for the payload seed). Prompt references to prior steps are
/// enforced at execution time, where a missing name fails with
/// [`FlowError::Template`] before any invocation occurs.
pub fn validate(config: &WorkflowConfig) -> Result<()> {
    if config.steps.is_empty() {
        return Err(FlowError::Config(
            "workflow has no steps to execute".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for step in &config.steps {
        if step.name == "input" {
            return Err(FlowError::Config(
                "step name 'input' is reserved for the payload seed".to_string(),
            ));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(FlowError::Config(format!(
                "duplicate step name: {}",
                step.name
            )));
        }
    }

    Ok(())
}

/// Legacy single-model selection, mirroring the pre-configuration CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyModel {
    /// One chat-completion step
    ChatGpt,
    /// One multi-turn reasoning step
    Claude,
    /// Two synthesized steps: reasoning, then chat refinement
    ClaudeFirst,
    /// One web-search step
    WebSearch,
}

/// Synthesize the step sequence for a legacy (no configuration file) run.
///
/// `claude-first` expands to the two-step plan: a `claude_analysis` step over
/// `{input}`, then a `chatgpt_refinement` step that reviews the analysis.
/// Every other selection is a single step over `{input}`. All steps share
/// `max_tokens` and `temperature`.
pub fn synthesize_legacy_steps(
    model: LegacyModel,
    max_tokens: u32,
    temperature: f32,
) -> Vec<StepSpec> {
    let params = ModelParams::new()
        .with("max_tokens", max_tokens)
        .with("temperature", temperature);

    match model {
        LegacyModel::ChatGpt => vec![StepSpec {
            name: "chatgpt_0".to_string(),
            model: ModelKind::ChatGpt,
            model_params: params,
            prompt_template: "{input}".to_string(),
        }],
        LegacyModel::Claude => vec![StepSpec {
            name: "claude_0".to_string(),
            model: ModelKind::Claude,
            model_params: params,
            prompt_template: "{input}".to_string(),
        }],
        LegacyModel::WebSearch => vec![StepSpec {
            name: "web_search_0".to_string(),
            model: ModelKind::WebSearch,
            model_params: params,
            prompt_template: "{input}".to_string(),
        }],
        LegacyModel::ClaudeFirst => vec![
            StepSpec {
                name: "claude_analysis".to_string(),
                model: ModelKind::Claude,
                model_params: params.clone(),
                prompt_template: "{input}".to_string(),
            },
            StepSpec {
                name: "chatgpt_refinement".to_string(),
                model: ModelKind::ChatGpt,
                model_params: params,
                prompt_template: "Here's an analysis from another AI assistant: \
                                  {claude_analysis.output}\n\nPlease review and refine \
                                  this analysis."
                    .to_string(),
            },
        ],
    }
}
