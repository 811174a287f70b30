//! Public-API tests for the direct runtime with a scripted reasoning exchange.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use docforge::agent::{AgentMessage, ReasoningExchange};
use docforge::runtime::{LocalRuntime, Runtime};
use docforge::ExchangeError;

/// Exchange that replays a fixed message sequence.
struct ScriptedExchange {
    messages: Vec<AgentMessage>,
}

#[async_trait]
impl ReasoningExchange for ScriptedExchange {
    async fn query(&self, _prompt: &str) -> Result<Vec<AgentMessage>, ExchangeError> {
        Ok(self.messages.clone())
    }
}

/// Exchange that always fails, standing in for a broken reasoning service.
struct BrokenExchange;

#[async_trait]
impl ReasoningExchange for BrokenExchange {
    async fn query(&self, _prompt: &str) -> Result<Vec<AgentMessage>, ExchangeError> {
        Err(ExchangeError::CliFailed {
            code: 1,
            stderr: "service unreachable".to_string(),
        })
    }
}

fn ensure_credential() {
    std::env::set_var("ANTHROPIC_API_KEY", "sk-test-key");
}

fn tool_use(tool: &str, input: serde_json::Value) -> AgentMessage {
    AgentMessage::ToolUse {
        tool: tool.to_string(),
        input,
    }
}

#[tokio::test]
async fn scripted_run_reports_findings_and_full_trace() {
    ensure_credential();

    let runtime = LocalRuntime::with_exchange(Arc::new(ScriptedExchange {
        messages: vec![
            tool_use("Read", json!({"file_path": "README.md"})),
            tool_use("Bash", json!({"command": "cargo build"})),
            AgentMessage::Completed {
                output: Some(json!({
                    "passed": true,
                    "details": "All good",
                    "steps": [{"tool": "Bash", "input": "cargo build", "output": "Finished", "is_error": false}],
                    "verification_command": "cargo run --example hello"
                })),
                is_error: false,
            },
        ],
    }));

    let result = runtime.run("follow the docs", ".", &mut |_| {}).await.unwrap();

    assert!(result.passed);
    assert_eq!(result.details, "All good");
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].tool, "Bash");
    assert_eq!(
        result.verification_command.as_deref(),
        Some("cargo run --example hello")
    );
    // The direct path keeps the whole exchange trace on the result.
    assert_eq!(result.messages.len(), 3);
}

#[tokio::test]
async fn events_are_delivered_in_order_and_marker_is_hidden() {
    ensure_credential();

    let runtime = LocalRuntime::with_exchange(Arc::new(ScriptedExchange {
        messages: vec![
            tool_use("Bash", json!({"command": "pip install ."})),
            tool_use("StructuredOutput", json!({})),
            tool_use("Grep", json!({"pattern": "install", "path": "docs"})),
            AgentMessage::Completed {
                output: Some(json!({"passed": true, "details": "ok"})),
                is_error: false,
            },
        ],
    }));

    let mut seen = Vec::new();
    runtime
        .run("prompt", ".", &mut |event| seen.push(event.tool.clone()))
        .await
        .unwrap();

    assert_eq!(seen, vec!["Bash", "Grep"]);
}

#[tokio::test]
async fn broken_exchange_yields_failure_result_not_error() {
    ensure_credential();

    let runtime = LocalRuntime::with_exchange(Arc::new(BrokenExchange));
    let result = runtime.run("prompt", ".", &mut |_| {}).await.unwrap();

    assert!(!result.passed);
    assert!(result.details.contains("Agent encountered an error"));
    assert!(result.details.contains("service unreachable"));
}

#[tokio::test]
async fn exchange_without_findings_yields_explained_failure() {
    ensure_credential();

    let runtime = LocalRuntime::with_exchange(Arc::new(ScriptedExchange {
        messages: vec![AgentMessage::Text {
            content: "I ran out of turns".to_string(),
        }],
    }));

    let result = runtime.run("prompt", ".", &mut |_| {}).await.unwrap();
    assert!(!result.passed);
    assert!(!result.details.is_empty());
}
