//! aiflow Core - Workflow orchestration engine
//!
//! This crate provides the foundational types and logic for aiflow: resolving
//! a declarative workflow configuration into an ordered execution plan,
//! templating prompts against an accumulating result context, and dispatching
//! each step to an abstract model-invocation capability with retry.
//!
//! # Modules
//!
//! - [`models`] - Core data models for workflows, steps, and results
//! - [`config`] - Configuration loading, normalization, and validation
//! - [`input`] - Input resolution (text, file, directory fan-out)
//! - [`template`] - Prompt template substitution
//! - [`retry`] - Bounded retry with exponential backoff
//! - [`invoke`] - The model-invocation capability contract
//! - [`step`] - Single-step execution
//! - [`engine`] - The workflow engine

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod engine;
pub mod input;
pub mod invoke;
pub mod models;
pub mod retry;
pub mod step;
pub mod template;

pub use config::*;
pub use engine::*;
pub use input::*;
pub use invoke::*;
pub use models::*;
pub use retry::*;
pub use step::*;
pub use template::*;

use thiserror::Error;

/// Core error type for the aiflow system
///
/// This enum represents all possible errors that can occur while running a
/// workflow, from input resolution to model invocation failures.
#[derive(Error, Debug)]
pub enum FlowError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input could not be resolved (missing file, no matching files)
    #[error("Input error: {0}")]
    Input(String),

    /// A prompt template referenced a name absent from the result context
    #[error("Unresolved placeholder '{placeholder}' in prompt template")]
    Template {
        /// The context key the template referenced
        placeholder: String,
    },

    /// Model invocation failed, annotated with the attempts consumed
    #[error("Model invocation failed after {attempts} attempt(s): {message}")]
    Invocation {
        /// Last error message from the invocation capability
        message: String,
        /// Whether the final failure was classified as transient
        transient: bool,
        /// Number of attempts consumed before giving up
        attempts: u32,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON or other serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Output could not be written
    #[error("Output error: {0}")]
    Output(String),
}

/// Result type alias using [`FlowError`]
pub type Result<T> = std::result::Result<T, FlowError>;
