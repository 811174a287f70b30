//! Execution runtimes for the documentation-checking agent.
//!
//! A runtime executes one check: instruction text plus a target path in,
//! one [`CheckResult`] out, tool events streamed to a callback as they
//! happen. The closed set of implementations — container-isolated by
//! default, direct host execution on request — sits behind the [`Runtime`]
//! trait and is chosen by [`resolve_runtime`].

pub mod container;
pub mod engine;
pub mod image;
pub mod local;

pub use container::ContainerRuntime;
pub use engine::{detect_engine, Engine};
pub use image::{ImageBuilder, AGENT_IMAGE};
pub use local::LocalRuntime;

use std::path::Path;

use async_trait::async_trait;

use crate::agent::OnEvent;
use crate::error::RuntimeError;
use crate::result::CheckResult;

/// Environment variable carrying the credential the agent needs to reason.
pub const CREDENTIAL_VAR: &str = "ANTHROPIC_API_KEY";

/// Contract for executing one documentation check.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Runs the agent against `target` with the given rendered instruction.
    ///
    /// `on_event` is invoked synchronously, in arrival order, for each tool
    /// event. Fails only for pre-flight conditions; anything after the
    /// worker starts is folded into the result.
    async fn run(
        &self,
        prompt: &str,
        target: &str,
        on_event: OnEvent<'_>,
    ) -> Result<CheckResult, RuntimeError>;
}

/// Returns the appropriate runtime: container-based by default, direct host
/// execution when `no_container` is set.
pub fn resolve_runtime(
    no_container: bool,
    verbose: bool,
) -> Result<Box<dyn Runtime>, RuntimeError> {
    if no_container {
        return Ok(Box::new(LocalRuntime::new()));
    }
    Ok(Box::new(ContainerRuntime::new(verbose)?))
}

/// Resolves the agent credential: the environment first, then a `.env` file
/// in the working directory. Fatal when neither yields a value — nothing
/// can run without it.
pub fn resolve_api_key() -> Result<String, RuntimeError> {
    if let Ok(value) = std::env::var(CREDENTIAL_VAR) {
        if !value.trim().is_empty() {
            return Ok(value);
        }
    }

    if let Ok(content) = std::fs::read_to_string(Path::new(".env")) {
        if let Some(value) = parse_env_file(&content, CREDENTIAL_VAR) {
            return Ok(value);
        }
    }

    Err(RuntimeError::CredentialMissing {
        var: CREDENTIAL_VAR.to_string(),
    })
}

/// Looks up `var` in `.env`-style content: `KEY=VALUE` lines, `#` comments,
/// optional single or double quotes around the value.
fn parse_env_file(content: &str, var: &str) -> Option<String> {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() == var {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}
