//! The documentation-checking agent.
//!
//! [`Agent`] is the direct execution path: one awaited call to the reasoning
//! exchange, a message trace, and a findings distilled from the terminal
//! message. It runs against the caller's filesystem with no isolation; the
//! container path wraps this same agent behind the wire protocol via the
//! `docforge agent` entrypoint.

pub mod exchange;

pub use exchange::{AgentMessage, CliExchange, ReasoningExchange};

use std::sync::Arc;

use crate::display::ToolEvent;
use crate::result::{AgentFindings, CheckResult};

/// Callback invoked synchronously for each tool event, in arrival order.
pub type OnEvent<'a> = &'a mut (dyn FnMut(&ToolEvent) + Send);

/// Appended to every rendered prompt so the exchange's final message carries
/// findings the runtime can parse.
const FINDINGS_FORMAT_PROMPT: &str = r#"End your final message with a single JSON object (no code fence required) of this exact shape:

{"passed": <bool: the instructions worked end to end>,
 "details": "<summary; on failure, direct constructive feedback for the maintainer>",
 "steps": [{"tool": "<tool>", "input": "<command or argument>", "output": "<result, truncated if long>", "is_error": <bool>}],
 "verification_command": "<command that proved the setup works, or null>"}"#;

/// The agent facade over one reasoning exchange.
pub struct Agent {
    exchange: Arc<dyn ReasoningExchange>,
}

impl Agent {
    /// Creates an agent over the given exchange.
    pub fn new(exchange: Arc<dyn ReasoningExchange>) -> Self {
        Self { exchange }
    }

    /// Creates an agent over the production CLI exchange.
    pub fn with_cli() -> Self {
        Self::new(Arc::new(CliExchange::new()))
    }

    /// Runs one check to completion.
    ///
    /// Never fails past the exchange boundary: an exchange error or a missing
    /// terminal findings is converted into a `passed=false` result, mirroring
    /// the container orchestrator's fallback policy.
    pub async fn run(&self, prompt: &str, on_event: OnEvent<'_>) -> CheckResult {
        let full_prompt = format!("{prompt}\n\n{FINDINGS_FORMAT_PROMPT}");

        let messages = match self.exchange.query(&full_prompt).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::debug!(error = %e, "Reasoning exchange failed");
                return CheckResult::new(
                    Vec::new(),
                    AgentFindings::failure(format!("Agent encountered an error: {e}")),
                );
            }
        };

        for message in &messages {
            if let AgentMessage::ToolUse { tool, input } = message {
                if crate::display::is_hidden(tool) {
                    continue;
                }
                on_event(&ToolEvent {
                    tool: tool.clone(),
                    input: input.clone(),
                });
            }
        }

        let findings = findings_from_messages(&messages);
        CheckResult::new(messages, findings)
    }
}

/// Distills the terminal message of a trace into findings.
fn findings_from_messages(messages: &[AgentMessage]) -> AgentFindings {
    match messages.last() {
        Some(AgentMessage::Completed {
            output: Some(output),
            ..
        }) => serde_json::from_value(output.clone()).unwrap_or_else(|e| {
            AgentFindings::failure(format!(
                "Agent reported findings that did not match the expected shape: {e}"
            ))
        }),
        Some(AgentMessage::Completed {
            output: None,
            is_error: true,
        }) => AgentFindings::failure("Reasoning exchange ended with an error and no findings."),
        Some(AgentMessage::Completed {
            output: None,
            is_error: false,
        }) => AgentFindings::failure("Reasoning exchange completed without parsable findings."),
        _ => AgentFindings::failure("Reasoning exchange ended without a terminal message."),
    }
}
