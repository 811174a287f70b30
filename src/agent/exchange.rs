//! The reasoning exchange: the boundary to the external reasoning service.
//!
//! The agent treats reasoning as an opaque collaborator behind the
//! [`ReasoningExchange`] trait: one query in, an ordered sequence of messages
//! out, the last of which is expected to carry the structured findings. The
//! production implementation drives the `claude` CLI in stream-JSON mode;
//! tests substitute scripted fakes.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::error::ExchangeError;
use crate::utils::extract_json_object;

/// Default reasoning CLI binary name.
const DEFAULT_BINARY: &str = "claude";

/// Tools the documentation-checking agent is allowed to use.
///
/// Read-only plus shell: the agent must be able to *run* the documented
/// steps, but file edits are not part of checking documentation.
const ALLOWED_TOOLS: &str = "Bash,Glob,Grep,Read";

/// One message from the reasoning exchange, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentMessage {
    /// The agent invoked a tool.
    ToolUse { tool: String, input: Value },
    /// Free-form assistant text.
    Text { content: String },
    /// Terminal message; `output` carries the structured findings when the
    /// exchange produced one.
    Completed {
        output: Option<Value>,
        is_error: bool,
    },
}

/// Contract for executing one reasoning exchange.
#[async_trait]
pub trait ReasoningExchange: Send + Sync {
    /// Runs one exchange to completion and returns its message sequence.
    async fn query(&self, prompt: &str) -> Result<Vec<AgentMessage>, ExchangeError>;
}

/// Production exchange: drives the `claude` CLI and parses its JSON stream.
pub struct CliExchange {
    binary: String,
}

impl CliExchange {
    /// Creates an exchange using the default `claude` binary from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
        }
    }

    /// Creates an exchange using a specific binary (tests, alternate installs).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for CliExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningExchange for CliExchange {
    async fn query(&self, prompt: &str) -> Result<Vec<AgentMessage>, ExchangeError> {
        let mut child = Command::new(&self.binary)
            .arg("--print")
            .arg(prompt)
            .args(["--output-format", "stream-json", "--verbose"])
            .args(["--allowed-tools", ALLOWED_TOOLS])
            .args(["--permission-mode", "bypassPermissions"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExchangeError::CliMissing {
                    binary: self.binary.clone(),
                    message: e.to_string(),
                },
                _ => ExchangeError::Io(e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ExchangeError::ParseError("reasoning CLI stdout was not captured".to_string())
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            ExchangeError::ParseError("reasoning CLI stderr was not captured".to_string())
        })?;

        // Drain stderr concurrently so a chatty CLI cannot stall the stream.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut messages = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    // Non-JSON log noise on the stream is tolerated.
                    if let Ok(raw) = serde_json::from_str::<Value>(line) {
                        messages.extend(parse_stream_message(&raw));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "Reasoning stream read error, stopping");
                    break;
                }
            }
        }

        let status = child.wait().await?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(ExchangeError::CliFailed {
                code: status.code().unwrap_or(-1),
                stderr: stderr_text.trim().to_string(),
            });
        }

        Ok(messages)
    }
}

/// Maps one raw stream-JSON line to zero or more [`AgentMessage`]s.
///
/// An `assistant` message may carry several content blocks; each tool-use and
/// text block becomes its own message so arrival order is preserved. Unknown
/// message types are dropped.
fn parse_stream_message(raw: &Value) -> Vec<AgentMessage> {
    match raw.get("type").and_then(Value::as_str) {
        Some("assistant") => {
            let blocks = raw
                .pointer("/message/content")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            blocks
                .iter()
                .filter_map(|block| match block.get("type").and_then(Value::as_str) {
                    Some("tool_use") => Some(AgentMessage::ToolUse {
                        tool: block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        input: block.get("input").cloned().unwrap_or(Value::Null),
                    }),
                    Some("text") => Some(AgentMessage::Text {
                        content: block
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    }),
                    _ => None,
                })
                .collect()
        }
        Some("result") => {
            let is_error = raw.get("is_error").and_then(Value::as_bool).unwrap_or(false);
            let output = raw
                .get("result")
                .and_then(Value::as_str)
                .and_then(extract_json_object)
                .and_then(|json| serde_json::from_str(&json).ok());
            vec![AgentMessage::Completed { output, is_error }]
        }
        _ => Vec::new(),
    }
}
