//! Types for the web search layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Query parameters for a single search-engine call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Full query string, site-scope operators included.
    pub query: String,
    /// Maximum results to request from the engine.
    pub limit: usize,
}

/// One organic hit as the engine reported it, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    /// Engine-reported rank, if any. Replaced during normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

/// A normalized search result.
///
/// `position` is the rank within the batch that produced it (0-based, unique
/// in that batch). It carries no meaning across batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub position: usize,
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Errors that can occur during search operations.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search backend connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Search backend API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for web search backends.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Execute one search and return the engine's organic hits in rank order.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawSearchHit>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_hit_tolerates_missing_fields() {
        let hit: RawSearchHit = serde_json::from_str(r#"{"title": "Only title"}"#).unwrap();
        assert_eq!(hit.title, "Only title");
        assert!(hit.link.is_empty());
        assert!(hit.position.is_none());
    }

    #[test]
    fn test_search_result_serialization() {
        let result = SearchResult {
            position: 2,
            title: "AlphaFold".to_string(),
            link: "https://www.nature.com/articles/s41586-021-03819-2".to_string(),
            snippet: "Highly accurate protein structure prediction".to_string(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["position"], 2);
        assert_eq!(json["title"], "AlphaFold");
    }
}
