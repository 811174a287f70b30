//! Shared formatting for real-time tool event display.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single reported agent action, streamed live over the side channel.
///
/// Transient: consumed immediately by a display callback and not retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEvent {
    /// Tool name (e.g. Bash, Read, Grep, Glob).
    pub tool: String,
    /// Structured tool input.
    pub input: Value,
}

/// Internal protocol events that are never displayed as tool actions.
const HIDDEN_TOOLS: &[&str] = &["StructuredOutput"];

/// Returns true for internal marker events that carry no user-meaningful content.
pub fn is_hidden(tool: &str) -> bool {
    HIDDEN_TOOLS.contains(&tool)
}

/// Renders a tool invocation as a short, human-readable line.
///
/// Pure function, no I/O. Unrecognized tools fall through to a generic
/// marker plus the raw name and input.
pub fn format_tool_event(tool: &str, input: &Value) -> String {
    let str_field = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or("");

    match tool {
        "Bash" => format!("$ {}", str_field("command")),
        "Read" => format!("> {}", str_field("file_path")),
        "Grep" => {
            let pattern = str_field("pattern");
            let path = input.get("path").and_then(Value::as_str).unwrap_or(".");
            format!("? grep '{pattern}' {path}")
        }
        "Glob" => format!("* {}", str_field("pattern")),
        _ => format!("# {tool} {input}"),
    }
}

/// Prints a formatted tool event to stderr, skipping internal markers.
pub fn print_tool_event(event: &ToolEvent) {
    if is_hidden(&event.tool) {
        return;
    }
    eprintln!("  {}", format_tool_event(&event.tool, &event.input));
}
