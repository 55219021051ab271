//! Engine configuration.
//!
//! One immutable object handed to the loop and orchestrator at
//! construction. Nothing in the core reads ambient process state; the
//! binary resolves environment and arguments and builds this explicitly.

use crate::agent::LoopConfig;
use crate::ai::RetryConfig;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default hard bound on model calls per run; agent definitions may
    /// override it per agent.
    pub max_steps: usize,
    /// Token budget that triggers summarization.
    pub context_budget: usize,
    /// Recursion ceiling for sub-agent invocation. The default of 1 means
    /// only the root agent may invoke sub-agents.
    pub max_depth: u32,
    /// Retry/backoff settings for the model gateway.
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            context_budget: 100_000,
            max_depth: 1,
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Per-run limits, honoring an agent definition's step override.
    pub fn loop_config(&self, max_steps_override: Option<usize>) -> LoopConfig {
        LoopConfig {
            max_steps: max_steps_override.unwrap_or(self.max_steps),
            context_budget: self.context_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let config = EngineConfig::default();
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn loop_config_honors_the_override() {
        let config = EngineConfig::default();
        assert_eq!(config.loop_config(None).max_steps, 10);
        assert_eq!(config.loop_config(Some(25)).max_steps, 25);
        assert_eq!(config.loop_config(Some(25)).context_budget, 100_000);
    }
}
