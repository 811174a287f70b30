//! docforge: agent-driven verification of getting-started documentation.
//!
//! Points an autonomous agent at a project's docs, has it follow the
//! instructions end to end inside an isolated container, and reports a
//! structured pass/fail verdict plus a live stream of the agent's actions.

pub mod agent;
pub mod cli;
pub mod display;
pub mod error;
pub mod prompt;
pub mod result;
pub mod runtime;
pub mod utils;

// Re-export the types a typical caller needs.
pub use error::{ExchangeError, PromptError, RuntimeError};
pub use result::{AgentFindings, AgentStep, CheckResult};
pub use runtime::{resolve_runtime, Runtime};
