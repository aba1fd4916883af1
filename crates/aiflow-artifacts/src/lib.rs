//! Result formatting and output writing for aiflow
//!
//! The engine produces a [`RunSummary`]; this crate turns it into the
//! configured rendering (plain text, markdown, JSON, or HTML) and writes it
//! to the console or a file. HTML output is the markdown rendering passed
//! through pulldown-cmark inside a standalone document.

#![warn(missing_docs)]

use aiflow_core::{OutputFormat, RunSummary, WorkflowResult};
use pulldown_cmark::{html, Parser};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Clean model output for plain-text display.
///
/// Collapses runs of whitespace and ensures the text ends with sentence
/// punctuation. The raw output in the run summary is left untouched.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if !cleaned.is_empty() && !cleaned.ends_with(['.', '!', '?', ':', ';']) {
        cleaned.push('.');
    }

    cleaned
}

/// Render a run summary in the requested format.
pub fn format_summary(summary: &RunSummary, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(summary)),
        OutputFormat::Markdown => Ok(render_markdown(summary)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        OutputFormat::Html => Ok(render_html(summary)),
    }
}

fn render_text(summary: &RunSummary) -> String {
    if let [only] = summary.results.as_slice() {
        return match &only.error {
            Some(error) => format!("Error: {error}"),
            None => clean_text(&only.final_output),
        };
    }

    let mut out = String::new();
    for result in &summary.results {
        out.push_str(&format!("=== {} ===\n", result.input_source));
        match &result.error {
            Some(error) => out.push_str(&format!("Error: {error}\n")),
            None => {
                out.push_str(&clean_text(&result.final_output));
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn render_markdown(summary: &RunSummary) -> String {
    let mut md = String::new();
    md.push_str("# AI Response\n\n");

    if summary.results.len() == 1 {
        render_result_md(&mut md, &summary.results[0], false);
    } else {
        for result in &summary.results {
            md.push_str(&format!("## {}\n\n", result.input_source));
            render_result_md(&mut md, result, true);
        }
    }

    md.push_str(&format!("*Generated by {}*\n", summary.workflow_name));
    md
}

fn render_result_md(md: &mut String, result: &WorkflowResult, nested: bool) {
    match &result.error {
        Some(error) => md.push_str(&format!("**Error:** {error}\n\n")),
        None => md.push_str(&format!("{}\n\n", result.final_output)),
    }

    let heading = if nested { "###" } else { "##" };
    md.push_str(&format!("{heading} Steps\n\n"));
    for step in &result.step_trace {
        let status = if step.succeeded { "ok" } else { "failed" };
        md.push_str(&format!(
            "- `{}`: {} ({} ms, {} attempt{})\n",
            step.step_name,
            status,
            step.duration_ms,
            step.attempts,
            if step.attempts == 1 { "" } else { "s" }
        ));
    }
    md.push('\n');
}

fn render_html(summary: &RunSummary) -> String {
    let markdown = render_markdown(summary);
    let parser = Parser::new(&markdown);
    let mut body = String::new();
    html::push_html(&mut body, parser);

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html>\n");
    out.push_str("<head>\n");
    out.push_str("    <title>AI Response</title>\n");
    out.push_str("    <style>\n");
    out.push_str("        body { font-family: Arial, sans-serif; margin: 20px; }\n");
    out.push_str("        h1 { color: #333; }\n");
    out.push_str(
        "        .response { padding: 10px; background-color: #f9f9f9; border-radius: 5px; }\n",
    );
    out.push_str("    </style>\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str("    <div class=\"response\">\n");
    out.push_str(&body);
    out.push_str("    </div>\n");
    out.push_str("</body>\n");
    out.push_str("</html>");
    out
}

/// Writes rendered output to its destination
pub struct OutputWriter;

impl OutputWriter {
    /// Write `content` to `path`, creating parent directories as needed.
    #[instrument(skip(content))]
    pub async fn write_file(path: impl AsRef<Path> + std::fmt::Debug, content: &str) -> anyhow::Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        info!("Wrote output: {}", path.display());
        Ok(path.to_path_buf())
    }
}
