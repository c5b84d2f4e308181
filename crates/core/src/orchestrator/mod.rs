//! Search orchestrator for iterative retrieval runs.
//!
//! A run moves through explicit phases:
//! - **Classifying**: pick the category that scopes queries and rubrics
//! - **InitialRetrieval / InitialJudging**: first batch and follow-up queries
//! - **Expanding**: follow-up rounds, fanned out, merged one at a time
//! - **DepthProbing**: optional page exploration feeding more rounds
//! - **Finalizing / Done**: accumulated results returned

mod config;
mod runner;
mod types;

pub use config::{ClassifierMode, OrchestratorConfig};
pub use runner::SearchOrchestrator;
pub use types::{EventSink, OrchestratorError, RunEvent, RunOutcome, RunPhase};
