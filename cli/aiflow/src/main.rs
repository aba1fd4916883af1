//! aiflow CLI
//!
//! Maps command-line flags onto a [`WorkflowConfig`] and runs it. With
//! `--config` the workflow comes from a JSON file and CLI flags override only
//! the input source and output destination; without one, a legacy single-step
//! (or `claude-first` two-step) workflow is synthesized from the flags.

use aiflow_artifacts::{format_summary, OutputWriter};
use aiflow_core::{
    load_config, synthesize_legacy_steps, InputSpec, LegacyModel, OutputFormat, OutputSpec,
    OutputTarget, ProcessingStrategy, RunSummary, WorkflowConfig,
};
use aiflow_providers::{build_registry, ProviderCredentials};
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aiflow")]
#[command(about = "Configurable multi-model AI workflow runner")]
#[command(version)]
struct Cli {
    /// Direct text input
    #[arg(short, long)]
    input: Option<String>,

    /// Path to an input file
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Process every matching file in a directory
    #[arg(long)]
    input_directory: Option<PathBuf>,

    /// Glob pattern matched against file names in the input directory
    #[arg(long, default_value = "*.txt")]
    file_pattern: String,

    /// Descend into subdirectories of the input directory
    #[arg(long)]
    recursive: bool,

    /// How directory files are processed
    #[arg(long, value_enum, default_value_t = StrategyArg::Individual)]
    processing_strategy: StrategyArg,

    /// AI model to use for legacy (no configuration file) runs
    #[arg(short, long, value_enum, default_value_t = ModelArg::Chatgpt)]
    model: ModelArg,

    /// Run a single web-search step instead of a chat model
    #[arg(long)]
    web_search: bool,

    /// Maximum tokens in each response (legacy runs)
    #[arg(long, default_value_t = 1000)]
    max_tokens: u32,

    /// Temperature (randomness) for legacy runs
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Path to a workflow configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write output to this file instead of the console
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Run in legacy mode (ignore the configuration file)
    #[arg(long)]
    legacy_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelArg {
    Chatgpt,
    Claude,
    ClaudeFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Individual,
    Concatenate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Text,
    Markdown,
    Json,
    Html,
}

impl From<StrategyArg> for ProcessingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Individual => ProcessingStrategy::Individual,
            StrategyArg::Concatenate => ProcessingStrategy::Concatenate,
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Html => OutputFormat::Html,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = build_config(&cli)?;

    let credentials = ProviderCredentials {
        openai_api_key: read_key("OPENAI_API_KEY"),
        anthropic_api_key: read_key("ANTHROPIC_API_KEY"),
    };
    let registry = build_registry(credentials)?;
    let engine = aiflow_core::WorkflowEngine::new(registry);

    println!(
        "{}",
        style(format!("🤖 Running workflow: {}", config.name))
            .bold()
            .cyan()
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Executing steps...");

    let summary = engine.run(&config).await?;

    pb.finish_with_message("Workflow complete");

    let rendered = format_summary(&summary, config.output.format)?;

    match (config.output.target, &config.output.path) {
        (OutputTarget::File, Some(path)) => {
            let written = OutputWriter::write_file(PathBuf::from(path), &rendered).await?;
            println!(
                "{}",
                style(format!("📄 Output saved to {}", written.display())).green()
            );
        }
        _ => {
            println!("\n{}", "=".repeat(50));
            println!("Workflow Result");
            println!("{}", "=".repeat(50));
            println!("{rendered}");
            println!("{}", "=".repeat(50));
        }
    }

    print_metadata(&summary);

    if !summary.succeeded() {
        println!("{}", style("❌ Workflow finished with failures").red().bold());
        std::process::exit(1);
    }

    println!("{}", style("✅ Done!").green().bold());
    Ok(())
}

fn print_metadata(summary: &RunSummary) {
    println!("\n{}", style("Metadata:").bold());
    println!("- Run ID: {}", summary.run_id);
    for result in &summary.results {
        let steps: Vec<String> = result
            .step_trace
            .iter()
            .map(|s| {
                format!(
                    "{} ({} ms, {} attempts)",
                    s.step_name, s.duration_ms, s.attempts
                )
            })
            .collect();
        println!("- Input source: {}", result.input_source);
        println!("  Steps: {}", steps.join(", "));
        if let Some(error) = &result.error {
            println!("  {}", style(format!("Error: {error}")).red());
        }
    }
}

fn read_key(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| SecretString::new(v.into()))
}

/// Build the workflow configuration from CLI flags, loading the configuration
/// file when one is supplied and not overridden by `--legacy-mode`.
fn build_config(cli: &Cli) -> anyhow::Result<WorkflowConfig> {
    match &cli.config {
        Some(path) if !cli.legacy_mode => {
            let mut config = load_config(path)?;

            // CLI flags override only the input source and output destination;
            // the configuration's step sequence is preserved unchanged.
            if let Some(input) = input_spec_from_flags(cli) {
                tracing::info!("Using input from CLI arguments (overriding configuration)");
                config.input = input;
            }
            if let Some(output_file) = &cli.output_file {
                config.output.target = OutputTarget::File;
                config.output.path = Some(output_file.display().to_string());
            }
            if let Some(format) = cli.format {
                config.output.format = format.into();
            }
            Ok(config)
        }
        _ => build_legacy_config(cli),
    }
}

/// Synthesize a workflow from flags alone, mirroring the pre-configuration
/// CLI: one step per selected model, or the claude-first two-step plan.
fn build_legacy_config(cli: &Cli) -> anyhow::Result<WorkflowConfig> {
    let model = if cli.web_search {
        LegacyModel::WebSearch
    } else {
        match cli.model {
            ModelArg::Chatgpt => LegacyModel::ChatGpt,
            ModelArg::Claude => LegacyModel::Claude,
            ModelArg::ClaudeFirst => LegacyModel::ClaudeFirst,
        }
    };

    let input = match input_spec_from_flags(cli) {
        Some(input) => input,
        None => InputSpec::Text {
            value: prompt_from_stdin()?,
        },
    };

    let model_name = match model {
        LegacyModel::ChatGpt => "chatgpt",
        LegacyModel::Claude => "claude",
        LegacyModel::ClaudeFirst => "claude-first",
        LegacyModel::WebSearch => "web-search",
    };

    Ok(WorkflowConfig {
        name: format!("legacy-{model_name}"),
        description: None,
        input,
        steps: synthesize_legacy_steps(model, cli.max_tokens, cli.temperature),
        output: OutputSpec {
            target: if cli.output_file.is_some() {
                OutputTarget::File
            } else {
                OutputTarget::Console
            },
            path: cli.output_file.as_ref().map(|p| p.display().to_string()),
            format: cli.format.map(Into::into).unwrap_or_default(),
        },
    })
}

fn input_spec_from_flags(cli: &Cli) -> Option<InputSpec> {
    if let Some(text) = &cli.input {
        Some(InputSpec::Text {
            value: text.clone(),
        })
    } else if let Some(file) = &cli.input_file {
        Some(InputSpec::File {
            path: file.display().to_string(),
        })
    } else {
        cli.input_directory.as_ref().map(|dir| InputSpec::Directory {
            path: dir.display().to_string(),
            file_pattern: cli.file_pattern.clone(),
            recursive: cli.recursive,
            processing_strategy: cli.processing_strategy.into(),
        })
    }
}

fn prompt_from_stdin() -> anyhow::Result<String> {
    print!("Enter your prompt: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let prompt = line.trim().to_string();
    if prompt.is_empty() {
        anyhow::bail!("no input provided");
    }
    Ok(prompt)
}
