//! Findings and results for documentation check runs.
//!
//! [`AgentFindings`] is the wire contract: the agent's self-reported verdict,
//! JSON-encoded as the last line of the worker's primary output channel.
//! [`CheckResult`] wraps a findings with run metadata and is the sole value
//! a runtime hands back to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentMessage;

/// A single tool action recorded in the agent's step log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStep {
    /// The tool used (e.g. Bash, Read, Grep, Glob).
    pub tool: String,
    /// The command or argument passed to the tool.
    pub input: String,
    /// The tool's output, truncated by the agent if very long.
    pub output: String,
    /// Whether the tool call resulted in an error.
    #[serde(default)]
    pub is_error: bool,
}

/// The agent's structured verdict — the authoritative output of a run.
///
/// Exactly one findings value exists per run: either parsed from the worker's
/// terminal output line or synthesized locally when the worker failed to
/// report one. `details` is never empty; a failed run always explains itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFindings {
    /// Whether the agent was able to follow the instructions end to end.
    pub passed: bool,
    /// Summary of how the attempt went; constructive feedback on failure.
    pub details: String,
    /// Ordered log of every tool action taken during the check.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<AgentStep>,
    /// The command used to verify the install succeeded, if any.
    #[serde(default)]
    pub verification_command: Option<String>,
}

impl AgentFindings {
    /// Creates a passing findings with the given details.
    pub fn success(details: impl Into<String>) -> Self {
        Self {
            passed: true,
            details: details.into(),
            steps: Vec::new(),
            verification_command: None,
        }
    }

    /// Creates a failing findings with the given details.
    ///
    /// Used wherever the orchestrator must substitute a verdict for a worker
    /// that crashed, timed out inside, or reported nothing parsable.
    pub fn failure(details: impl Into<String>) -> Self {
        Self {
            passed: false,
            details: details.into(),
            steps: Vec::new(),
            verification_command: None,
        }
    }
}

/// Complete result of one documentation check run.
///
/// Owned exclusively by the caller after return; the runtime retains nothing.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Whether the check passed.
    pub passed: bool,
    /// Human-readable detail text, always present.
    pub details: String,
    /// Ordered step log, when the agent reported one.
    pub steps: Vec<AgentStep>,
    /// Verification command, when the agent reported one.
    pub verification_command: Option<String>,
    /// Full message trace from the reasoning exchange (direct runtime only;
    /// empty for container runs, where the trace stays inside the worker).
    pub messages: Vec<AgentMessage>,
    /// When this result was created.
    pub timestamp: DateTime<Utc>,
}

impl CheckResult {
    /// Creates a result from an agent findings plus the message trace.
    pub fn new(messages: Vec<AgentMessage>, findings: AgentFindings) -> Self {
        Self {
            passed: findings.passed,
            details: findings.details,
            steps: findings.steps,
            verification_command: findings.verification_command,
            messages,
            timestamp: Utc::now(),
        }
    }
}
