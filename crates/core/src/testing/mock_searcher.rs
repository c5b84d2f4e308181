//! Mock searcher for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::searcher::{RawSearchHit, SearchError, SearchQuery, Searcher};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    /// The query that was searched, site scope included.
    pub query: SearchQuery,
    /// When the search was made.
    pub timestamp: Instant,
}

/// A query handler that produces hits dynamically based on the query.
type QueryHandler = Box<dyn Fn(&str) -> Option<Vec<RawSearchHit>> + Send + Sync>;

/// Mock implementation of the Searcher trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable hits, or per-query hits via a handler
/// - Track search queries for assertions
/// - Simulate failures and delays
///
/// # Example
///
/// ```rust,ignore
/// use autosearch_core::testing::{MockSearcher, fixtures};
///
/// let searcher = MockSearcher::new();
/// searcher.set_results(fixtures::raw_hits(3)).await;
///
/// let hits = searcher.search(&SearchQuery { query: "q".into(), limit: 8 }).await?;
/// assert_eq!(hits.len(), 3);
///
/// let searches = searcher.recorded_searches().await;
/// assert_eq!(searches[0].query.query, "q");
/// ```
pub struct MockSearcher {
    /// Hits returned when no handler applies.
    results: Arc<RwLock<Vec<RawSearchHit>>>,
    /// Recorded search queries.
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    /// If set, the next search will fail with this error.
    next_error: Arc<RwLock<Option<SearchError>>>,
    /// Query handler for dynamic results based on the query string.
    query_handler: Arc<RwLock<Option<QueryHandler>>>,
    /// Simulated latency per search.
    delay: Arc<RwLock<Option<Duration>>>,
}

impl std::fmt::Debug for MockSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSearcher")
            .field("results", &"<results>")
            .field("searches", &"<searches>")
            .field("next_error", &"<next_error>")
            .field("query_handler", &"<handler>")
            .finish()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearcher {
    /// Create a new mock searcher with no hits.
    pub fn new() -> Self {
        Self {
            results: Arc::new(RwLock::new(Vec::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            query_handler: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the hits to return for subsequent searches.
    pub async fn set_results(&self, results: Vec<RawSearchHit>) {
        *self.results.write().await = results;
    }

    /// Get recorded search queries.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Get the number of searches performed.
    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    /// Configure the next search to fail with the given error.
    pub async fn set_next_error(&self, error: SearchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every search by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Set a query handler that generates hits based on the query string.
    ///
    /// Return `Some(hits)` to override the default hits, or `None` to fall
    /// back to them.
    ///
    /// ```rust,ignore
    /// searcher.set_query_handler(|query| {
    ///     if query.contains("alphafold") {
    ///         Some(vec![fixtures::raw_hit("AlphaFold", "https://x.org/af", "")])
    ///     } else {
    ///         Some(vec![])
    ///     }
    /// }).await;
    /// ```
    pub async fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Option<Vec<RawSearchHit>> + Send + Sync + 'static,
    {
        *self.query_handler.write().await = Some(Box::new(handler));
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<SearchError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl Searcher for MockSearcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawSearchHit>, SearchError> {
        self.searches.write().await.push(RecordedSearch {
            query: query.clone(),
            timestamp: Instant::now(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let handler = self.query_handler.read().await;
        if let Some(ref h) = *handler {
            if let Some(hits) = h(&query.query) {
                return Ok(hits.into_iter().take(query.limit).collect());
            }
        }
        drop(handler);

        Ok(self
            .results
            .read()
            .await
            .iter()
            .take(query.limit)
            .cloned()
            .collect())
    }
}
