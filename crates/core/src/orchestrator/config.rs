//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Which classifier decides the query category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    /// LLM structured call, falling back to General.
    #[default]
    Llm,
    /// Offline keyword heuristic.
    Keyword,
}

/// Configuration for the search orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub classifier: ClassifierMode,

    /// Follow-up queries kept from the first-pass judgment (1-5).
    #[serde(default = "default_max_additional_queries")]
    pub max_additional_queries: usize,

    /// Follow-up rounds retrieved and judged at the same time.
    #[serde(default = "default_max_concurrent_rounds")]
    pub max_concurrent_rounds: usize,

    /// Capacity of the per-run event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_additional_queries() -> usize {
    3
}

fn default_max_concurrent_rounds() -> usize {
    3
}

fn default_event_buffer() -> usize {
    64
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierMode::default(),
            max_additional_queries: default_max_additional_queries(),
            max_concurrent_rounds: default_max_concurrent_rounds(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=5).contains(&self.max_additional_queries) {
            return Err(format!(
                "orchestrator.max_additional_queries must be between 1 and 5, got {}",
                self.max_additional_queries
            ));
        }
        if self.max_concurrent_rounds == 0 {
            return Err("orchestrator.max_concurrent_rounds must be at least 1".to_string());
        }
        if self.event_buffer == 0 {
            return Err("orchestrator.event_buffer must be at least 1".to_string());
        }
        Ok(())
    }
}
