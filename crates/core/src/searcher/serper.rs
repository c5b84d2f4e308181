//! Serper (Google Search API) backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::SearchConfig;

use super::{RawSearchHit, SearchError, SearchQuery, Searcher};

/// Serper search backend.
pub struct SerperSearcher {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<RawSearchHit>,
}

impl SerperSearcher {
    /// Create a new SerperSearcher with the given configuration.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.api_base)
    }
}

#[async_trait]
impl Searcher for SerperSearcher {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawSearchHit>, SearchError> {
        debug!(query = %query.query, "Searching Serper");

        let response = self
            .client
            .post(self.search_url())
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest {
                q: &query.query,
                num: query.limit,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else if e.is_connect() {
                    SearchError::ConnectionFailed(e.to_string())
                } else {
                    SearchError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let serper_response: SerperResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ApiError(format!("Failed to parse response: {}", e)))?;

        debug!(results = serper_response.organic.len(), "Serper search complete");

        Ok(serper_response.organic)
    }
}
