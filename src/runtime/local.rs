//! Direct runtime: runs the agent on the host, no isolation.

use std::sync::Arc;

use async_trait::async_trait;

use super::{resolve_api_key, Runtime};
use crate::agent::{Agent, OnEvent, ReasoningExchange};
use crate::error::RuntimeError;
use crate::result::CheckResult;

/// Runs the agent in-process against the caller's filesystem.
///
/// No container, no mount, no wire protocol: the single suspension point is
/// the awaited reasoning exchange, and the full message trace survives on
/// the returned result.
pub struct LocalRuntime {
    exchange: Arc<dyn ReasoningExchange>,
}

impl LocalRuntime {
    /// Creates a local runtime over the production CLI exchange.
    pub fn new() -> Self {
        Self {
            exchange: Arc::new(crate::agent::CliExchange::new()),
        }
    }

    /// Creates a local runtime over a caller-supplied exchange.
    pub fn with_exchange(exchange: Arc<dyn ReasoningExchange>) -> Self {
        Self { exchange }
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runtime for LocalRuntime {
    async fn run(
        &self,
        prompt: &str,
        _target: &str,
        on_event: OnEvent<'_>,
    ) -> Result<CheckResult, RuntimeError> {
        // Same credential pre-flight as the container path; the agent
        // cannot reason without it.
        resolve_api_key()?;

        let agent = Agent::new(Arc::clone(&self.exchange));
        Ok(agent.run(prompt, on_event).await)
    }
}
