//! Scoping and normalization around a [`Searcher`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::category::Category;
use crate::metrics;

use super::{RawSearchHit, SearchQuery, SearchResult, Searcher};

/// Wraps the search backend for the orchestrator.
///
/// Retrieval never fails: transport errors are logged and produce an empty
/// batch so a run can continue with whatever else it has.
pub struct RetrievalAdapter {
    searcher: Arc<dyn Searcher>,
    result_limit: usize,
}

impl RetrievalAdapter {
    pub fn new(searcher: Arc<dyn Searcher>, result_limit: usize) -> Self {
        Self {
            searcher,
            result_limit: result_limit.max(1),
        }
    }

    pub fn result_limit(&self) -> usize {
        self.result_limit
    }

    /// Scope `query` for `category`, run it, and normalize the hits.
    pub async fn retrieve(&self, query: &str, category: Category) -> Vec<SearchResult> {
        let scoped = category.scope_query(query);
        let start = Instant::now();

        let search_query = SearchQuery {
            query: scoped,
            limit: self.result_limit,
        };

        match self.searcher.search(&search_query).await {
            Ok(hits) => {
                let results = normalize_hits(hits, self.result_limit);
                metrics::RETRIEVALS_TOTAL
                    .with_label_values(&[self.searcher.name(), "success"])
                    .inc();
                metrics::SEARCH_RESULTS
                    .with_label_values(&[])
                    .observe(results.len() as f64);
                debug!(
                    backend = self.searcher.name(),
                    query = %search_query.query,
                    results = results.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Retrieval complete"
                );
                results
            }
            Err(e) => {
                metrics::RETRIEVALS_TOTAL
                    .with_label_values(&[self.searcher.name(), "error"])
                    .inc();
                warn!(
                    backend = self.searcher.name(),
                    query = %search_query.query,
                    error = %e,
                    "Retrieval failed, continuing with empty batch"
                );
                Vec::new()
            }
        }
    }
}

/// Trim fields, drop hits without a title or link, cap at `limit`, and
/// renumber positions `0..n` in engine order.
pub fn normalize_hits(hits: Vec<RawSearchHit>, limit: usize) -> Vec<SearchResult> {
    hits.into_iter()
        .filter_map(|hit| {
            let title = hit.title.trim();
            let link = hit.link.trim();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some((title.to_string(), link.to_string(), hit.snippet.trim().to_string()))
        })
        .take(limit)
        .enumerate()
        .map(|(position, (title, link, snippet))| SearchResult {
            position,
            title,
            link,
            snippet,
        })
        .collect()
}
