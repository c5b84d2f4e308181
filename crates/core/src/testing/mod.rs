//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every external collaborator
//! (search engine, LLM, page fetcher, renderer, action detector) so runs can
//! be tested end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use autosearch_core::testing::{fixtures, MockLlmClient, MockSearcher};
//!
//! let searcher = MockSearcher::new();
//! searcher.set_results(fixtures::raw_hits(5)).await;
//!
//! let llm = MockLlmClient::new();
//! llm.push_response(&fixtures::first_pass_json(&[0, 2], &["follow up"], None));
//! ```

mod mock_depth;
mod mock_llm;
mod mock_searcher;

pub use mock_depth::{FetchPath, MockActionDetector, MockPageFetcher, MockRenderer};
pub use mock_llm::MockLlmClient;
pub use mock_searcher::{MockSearcher, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::depth::{FetchedPage, PageKind, PageLink};
    use crate::searcher::{RawSearchHit, SearchResult};

    /// A raw engine hit.
    pub fn raw_hit(title: &str, link: &str, snippet: &str) -> RawSearchHit {
        RawSearchHit {
            title: title.to_string(),
            link: link.to_string(),
            snippet: snippet.to_string(),
            position: None,
        }
    }

    /// `n` distinct hits titled "Result {i}" at `https://example.com/{i}`.
    pub fn raw_hits(n: usize) -> Vec<RawSearchHit> {
        (0..n)
            .map(|i| {
                raw_hit(
                    &format!("Result {}", i),
                    &format!("https://example.com/{}", i),
                    &format!("Snippet for result {}", i),
                )
            })
            .collect()
    }

    /// A normalized result.
    pub fn search_result(position: usize, title: &str, link: &str) -> SearchResult {
        SearchResult {
            position,
            title: title.to_string(),
            link: link.to_string(),
            snippet: format!("About {}", title),
        }
    }

    /// `n` normalized results matching [`raw_hits`] after normalization.
    pub fn search_results(n: usize) -> Vec<SearchResult> {
        (0..n)
            .map(|i| SearchResult {
                position: i,
                title: format!("Result {}", i),
                link: format!("https://example.com/{}", i),
                snippet: format!("Snippet for result {}", i),
            })
            .collect()
    }

    /// First-pass judge reply.
    pub fn first_pass_json(
        positions: &[i64],
        queries: &[&str],
        missing_information: Option<&str>,
    ) -> String {
        serde_json::json!({
            "reasoning": "scripted first pass",
            "relevant_positions": positions,
            "additional_queries": queries,
            "missing_information": missing_information,
        })
        .to_string()
    }

    /// Second-pass judge reply.
    pub fn second_pass_json(positions: &[i64]) -> String {
        serde_json::json!({
            "reasoning": "scripted second pass",
            "relevant_positions": positions,
        })
        .to_string()
    }

    /// An HTML page as the fetcher would return it.
    pub fn html_page(url: &str, title: &str, text: &str, links: Vec<PageLink>) -> FetchedPage {
        FetchedPage {
            url: url.to_string(),
            kind: PageKind::Html,
            title: title.to_string(),
            text: text.to_string(),
            links,
        }
    }

    pub fn page_link(label: &str, url: &str) -> PageLink {
        PageLink {
            label: label.to_string(),
            url: url.to_string(),
        }
    }
}
