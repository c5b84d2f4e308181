//! LLM-driven decision components.
//!
//! - [`QueryClassifier`]: assigns a [`Category`](crate::category::Category) to a query
//! - [`RelevanceJudge`]: selects relevant results and proposes follow-up queries
//! - [`QueryReformulator`]: rewrites a query with search-engine operators
//! - [`SimilarQueryBuilder`]: builds a query for pages like the one being read

mod classifier;
mod judge;
mod reformulate;
mod similar;

pub use classifier::{Classification, KeywordClassifier, LlmClassifier, QueryClassifier};
pub use judge::{JudgmentResult, LlmJudge, LlmJudgeConfig, RelevanceJudge};
pub use reformulate::{QueryReformulator, Reformulation};
pub use similar::{SimilarQuery, SimilarQueryBuilder};

use std::collections::BTreeSet;
use thiserror::Error;

use crate::llm::LlmError;

/// Errors from LLM-driven decisions.
#[derive(Debug, Clone, Error)]
pub enum BrainError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("Query is empty")]
    EmptyQuery,
}

/// Collapse runs of whitespace and trim.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase word set of a query, used to spot reworded duplicates.
pub(crate) fn token_set(query: &str) -> BTreeSet<String> {
    query.split_whitespace().map(|t| t.to_lowercase()).collect()
}
