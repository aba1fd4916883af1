//! Input resolution
//!
//! Turns an [`InputSpec`] into one or more text payloads. Directory inputs
//! enumerate files matching a glob pattern, sorted by path so fan-out order
//! is deterministic across runs.

use crate::models::{InputSpec, ProcessingStrategy};
use crate::{FlowError, Result};
use globset::Glob;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One resolved input text unit
///
/// A payload undergoes its own independent run of the full step sequence.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The input text
    pub text: String,
    /// Which file or text produced this payload
    pub source: String,
}

/// Resolve an input specification into a non-empty ordered payload sequence.
///
/// # Errors
///
/// Returns [`FlowError::Input`] for empty inline text, missing or unreadable
/// files, and directory patterns that match no files.
pub fn resolve(spec: &InputSpec) -> Result<Vec<Payload>> {
    match spec {
        InputSpec::Text { value } => {
            if value.trim().is_empty() {
                return Err(FlowError::Input("empty input provided".to_string()));
            }
            Ok(vec![Payload {
                text: value.clone(),
                source: "inline".to_string(),
            }])
        }
        InputSpec::File { path } => {
            let text = read_file(Path::new(path))?;
            Ok(vec![Payload {
                text,
                source: path.clone(),
            }])
        }
        InputSpec::Directory {
            path,
            file_pattern,
            recursive,
            processing_strategy,
        } => resolve_directory(Path::new(path), file_pattern, *recursive, *processing_strategy),
    }
}

fn read_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(FlowError::Input(format!(
            "file not found: {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| FlowError::Input(format!("failed to read {}: {e}", path.display())))?;
    info!(path = %path.display(), bytes = text.len(), "Read input file");
    Ok(text)
}

fn resolve_directory(
    dir: &Path,
    file_pattern: &str,
    recursive: bool,
    strategy: ProcessingStrategy,
) -> Result<Vec<Payload>> {
    if !dir.is_dir() {
        return Err(FlowError::Input(format!(
            "directory not found: {}",
            dir.display()
        )));
    }

    let matcher = Glob::new(file_pattern)
        .map_err(|e| FlowError::Input(format!("invalid file pattern '{file_pattern}': {e}")))?
        .compile_matcher();

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| matcher.is_match(entry.file_name()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(FlowError::Input(format!(
            "no files matching '{file_pattern}' under {}",
            dir.display()
        )));
    }

    debug!(
        dir = %dir.display(),
        pattern = file_pattern,
        count = files.len(),
        ?strategy,
        "Enumerated directory input"
    );

    match strategy {
        ProcessingStrategy::Individual => files
            .iter()
            .map(|file| {
                Ok(Payload {
                    text: read_file(file)?,
                    source: file.display().to_string(),
                })
            })
            .collect(),
        ProcessingStrategy::Concatenate => {
            let mut sections = Vec::with_capacity(files.len());
            for file in &files {
                sections.push(format!("--- {} ---\n{}", file.display(), read_file(file)?));
            }
            Ok(vec![Payload {
                text: sections.join("\n\n"),
                source: format!("concatenated:{} files", files.len()),
            }])
        }
    }
}
