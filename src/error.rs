//! Error types for docforge operations.
//!
//! Defines error types for the major subsystems:
//! - Runtime orchestration (engine detection, image build, container runs)
//! - Prompt loading and rendering
//! - Reasoning exchange interactions

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur before a run can even be attempted.
///
/// Anything that happens *after* the worker process has been spawned is
/// captured into an [`crate::result::AgentFindings`] instead of surfacing
/// here; these variants cover the pre-flight conditions for which no
/// meaningful result can be synthesized.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(
        "No container engine found. Install podman or docker, \
         or pass --no-container to run without isolation"
    )]
    EngineMissing,

    #[error("{var} is not set. Export it or add it to a .env file in the working directory")]
    CredentialMissing { var: String },

    #[error("Containerfile not found at {path}. Cannot build the agent image")]
    RecipeMissing { path: PathBuf },

    #[error("Image build failed:\n{stderr}")]
    ImageBuildFailed { stderr: String },

    #[error("Target path '{0}' does not exist")]
    TargetMissing(String),

    #[error("Container run timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while loading or rendering a prompt document.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read prompt file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid front matter in '{path}': {message}")]
    FrontMatter { path: String, message: String },

    #[error("Template rendering error: {0}")]
    Render(#[from] tera::Error),
}

/// Errors that can occur while talking to the reasoning service.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Reasoning CLI '{binary}' not found: {message}")]
    CliMissing { binary: String, message: String },

    #[error("Reasoning CLI exited with code {code}: {stderr}")]
    CliFailed { code: i32, stderr: String },

    #[error("Failed to parse message from reasoning stream: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
