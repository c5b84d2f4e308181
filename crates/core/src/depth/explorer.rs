//! Single-page exploration that turns a promising result into two sharper
//! follow-up queries.
//!
//! Every step degrades instead of failing: a page that cannot be fetched
//! falls back to the result's title and snippet, a screenshot that cannot be
//! taken or read means no action is needed, and a synthesis failure still
//! produces two queries built from keywords and the title.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::brain::normalize_whitespace;
use crate::llm::{complete_json, CompletionRequest, LlmClient, LlmUsage};
use crate::metrics;
use crate::searcher::SearchResult;

use super::extract::extract_windows;
use super::{
    ActionDescription, ActionDetector, DepthConfig, FetchedPage, PageFetcher, PageKind, PageLink,
    PageRenderer,
};

/// Maximum page characters shown to the LLM for keyword extraction.
const KEYWORD_CONTEXT_CHARS: usize = 6000;
/// Maximum links offered to the LLM when resolving an action.
const MAX_CANDIDATE_LINKS: usize = 80;
const MAX_KEYWORDS: usize = 5;

/// The two follow-up queries produced for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefinedQueries {
    /// Narrows the original topic.
    pub narrowed: String,
    /// Pursues a subtopic the original query does not cover.
    pub subtopic: String,
}

impl RefinedQueries {
    pub fn into_vec(self) -> Vec<String> {
        vec![self.narrowed, self.subtopic]
    }
}

/// Outcome of exploring one page.
#[derive(Debug, Clone)]
pub struct Exploration {
    pub link: String,
    pub queries: RefinedQueries,
    /// None when the page could not be fetched.
    pub page_kind: Option<PageKind>,
    /// Set when an action was detected and its target fetched.
    pub navigated_to: Option<String>,
    pub keywords: Vec<String>,
    /// Number of keyword windows the queries were built from.
    pub windows: usize,
    /// False when the fallback queries were used.
    pub synthesized: bool,
    pub usage: LlmUsage,
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LinkChoice {
    #[serde(default)]
    index: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    narrowed: String,
    subtopic: String,
}

/// Explores pages for deeper follow-up queries.
pub struct DepthExplorer {
    fetcher: Arc<dyn PageFetcher>,
    renderer: Arc<dyn PageRenderer>,
    detector: Arc<dyn ActionDetector>,
    client: Arc<dyn LlmClient>,
    config: DepthConfig,
}

impl DepthExplorer {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        renderer: Arc<dyn PageRenderer>,
        detector: Arc<dyn ActionDetector>,
        client: Arc<dyn LlmClient>,
        config: DepthConfig,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            detector,
            client,
            config,
        }
    }

    pub fn config(&self) -> &DepthConfig {
        &self.config
    }

    fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.config.page_timeout_secs as u64)
    }

    pub async fn explore(&self, result: &SearchResult, original_query: &str) -> Exploration {
        let mut usage = LlmUsage::default();

        let mut page = self.fetch(&result.link).await;
        let mut keywords = match &page {
            Some(p) => self.extract_keywords(p, original_query, &mut usage).await,
            None => Vec::new(),
        };

        // PDFs have no interactive surface; only HTML pages are screenshotted.
        let target = match page.as_ref().filter(|p| p.kind == PageKind::Html) {
            Some(current) => match self.detect_action(&current.url, original_query, &mut usage).await
            {
                Some(action) => {
                    self.resolve_link(&action, &current.links, &mut usage)
                        .await
                }
                None => None,
            },
            None => None,
        };

        let mut navigated_to = None;
        if let Some(link) = target {
            if let Some(next) = self.fetch(&link.url).await {
                debug!(from = %result.link, to = %link.url, "Followed detected action");
                metrics::DEPTH_NAVIGATIONS.inc();
                keywords = self
                    .extract_keywords(&next, original_query, &mut usage)
                    .await;
                navigated_to = Some(link.url);
                page = Some(next);
            }
        }

        let windows = match &page {
            Some(p) if !keywords.is_empty() => extract_windows(
                &p.text,
                &keywords,
                self.config.window_chars,
                self.config.max_windows,
            ),
            _ => Vec::new(),
        };

        let basis = if windows.is_empty() {
            format!("{}\n{}", result.title, result.snippet)
        } else {
            windows.join("\n...\n")
        };

        let (queries, synthesized) = match self
            .synthesize(&basis, original_query, &mut usage)
            .await
        {
            Some(queries) => (queries, true),
            None => (fallback_queries(original_query, &keywords, result), false),
        };

        let kind_label = match page.as_ref().map(|p| p.kind) {
            Some(PageKind::Html) if !windows.is_empty() => "html",
            Some(PageKind::Pdf) if !windows.is_empty() => "pdf",
            _ => "snippet",
        };
        metrics::DEPTH_EXPLORATIONS
            .with_label_values(&[kind_label, if synthesized { "synthesized" } else { "fallback" }])
            .inc();
        metrics::record_llm_usage(self.client.provider(), usage);

        Exploration {
            link: result.link.clone(),
            queries,
            page_kind: page.map(|p| p.kind),
            navigated_to,
            keywords,
            windows: windows.len(),
            synthesized,
            usage,
        }
    }

    async fn fetch(&self, url: &str) -> Option<FetchedPage> {
        match tokio::time::timeout(self.page_timeout(), self.fetcher.fetch_page(url)).await {
            Ok(Ok(page)) => Some(page),
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Page fetch failed, using snippet");
                None
            }
            Err(_) => {
                warn!(url = %url, timeout = ?self.page_timeout(), "Page fetch timed out, using snippet");
                None
            }
        }
    }

    async fn extract_keywords(
        &self,
        page: &FetchedPage,
        query: &str,
        usage: &mut LlmUsage,
    ) -> Vec<String> {
        let excerpt: String = page.text.chars().take(KEYWORD_CONTEXT_CHARS).collect();
        let request = CompletionRequest::new(format!(
            "Query: {}\n\nPage title: {}\n\nPage text:\n{}",
            query, page.title, excerpt
        ))
        .with_system(
            "Pick the 3-5 keywords or short phrases from this page text that are most relevant \
             to the query. Copy them exactly as they appear in the text.\n\n\
             Respond with JSON only, no other text:\n{\"keywords\": [\"phrase one\", \"phrase two\"]}",
        )
        .with_max_tokens(200);

        match complete_json::<KeywordResponse>(self.client.as_ref(), request).await {
            Ok((response, used)) => {
                usage.add(used);
                let mut keywords: Vec<String> = Vec::new();
                for keyword in response.keywords {
                    let keyword = normalize_whitespace(&keyword);
                    if !keyword.is_empty()
                        && !keywords.iter().any(|k| k.eq_ignore_ascii_case(&keyword))
                    {
                        keywords.push(keyword);
                    }
                }
                keywords.truncate(MAX_KEYWORDS);
                keywords
            }
            Err(e) => {
                warn!(url = %page.url, error = %e, "Keyword extraction failed");
                Vec::new()
            }
        }
    }

    async fn detect_action(
        &self,
        url: &str,
        query: &str,
        usage: &mut LlmUsage,
    ) -> Option<ActionDescription> {
        let image = match tokio::time::timeout(self.page_timeout(), self.renderer.screenshot(url))
            .await
        {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => {
                debug!(url = %url, renderer = self.renderer.name(), error = %e, "No screenshot, assuming no action");
                return None;
            }
            Err(_) => {
                warn!(url = %url, "Screenshot timed out, assuming no action");
                return None;
            }
        };

        match self.detector.detect_required_action(&image, query).await {
            Ok(detection) => {
                usage.add(detection.usage);
                detection.action
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Action detection failed, assuming no action");
                None
            }
        }
    }

    /// Pick the link an action refers to: LLM choice first, label match second.
    async fn resolve_link(
        &self,
        action: &ActionDescription,
        links: &[PageLink],
        usage: &mut LlmUsage,
    ) -> Option<PageLink> {
        if links.is_empty() {
            return None;
        }
        let candidates = &links[..links.len().min(MAX_CANDIDATE_LINKS)];

        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, l)| format!("[{}] {} -> {}", i, l.label, l.url))
            .collect::<Vec<_>>()
            .join("\n");
        let request = CompletionRequest::new(format!(
            "Action: {}\n\nLinks:\n{}",
            action.description, listing
        ))
        .with_system(
            "Choose the link that performs the described action.\n\n\
             Respond with JSON only, no other text:\n{\"index\": <number>} or {\"index\": null}",
        )
        .with_max_tokens(50);

        match complete_json::<LinkChoice>(self.client.as_ref(), request).await {
            Ok((choice, used)) => {
                usage.add(used);
                let picked = choice
                    .index
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| candidates.get(i));
                if let Some(link) = picked {
                    return Some(link.clone());
                }
            }
            Err(e) => {
                debug!(error = %e, "Link resolution by LLM failed, matching labels");
            }
        }

        fallback_link_match(&action.description, candidates).cloned()
    }

    async fn synthesize(
        &self,
        basis: &str,
        original_query: &str,
        usage: &mut LlmUsage,
    ) -> Option<RefinedQueries> {
        let request = CompletionRequest::new(format!(
            "Original query: {}\n\nExtracted text:\n{}",
            original_query, basis
        ))
        .with_system(
            "From the extracted text and the original query, write exactly two search queries: \
             one that narrows the original topic using specifics from the text, and one that \
             pursues a related subtopic the original query does not cover.\n\n\
             Respond with JSON only, no other text:\n{\"narrowed\": \"...\", \"subtopic\": \"...\"}",
        )
        .with_max_tokens(200)
        .with_temperature(0.2);

        match complete_json::<SynthesisResponse>(self.client.as_ref(), request).await {
            Ok((response, used)) => {
                usage.add(used);
                let narrowed = normalize_whitespace(&response.narrowed);
                let subtopic = normalize_whitespace(&response.subtopic);
                if narrowed.is_empty() || subtopic.is_empty() {
                    warn!("Query synthesis returned an empty query");
                    return None;
                }
                Some(RefinedQueries { narrowed, subtopic })
            }
            Err(e) => {
                warn!(error = %e, "Query synthesis failed, using fallback queries");
                None
            }
        }
    }
}

/// Queries built without the LLM: the original plus the best keyword (or
/// the title), and the title on its own.
pub fn fallback_queries(
    original_query: &str,
    keywords: &[String],
    result: &SearchResult,
) -> RefinedQueries {
    let title = normalize_whitespace(&result.title);
    let best = keywords.first().cloned().unwrap_or_else(|| title.clone());
    RefinedQueries {
        narrowed: normalize_whitespace(&format!("{} {}", original_query, best)),
        subtopic: title,
    }
}

/// Case-insensitive label match between an action description and links.
///
/// Quoted text in the description ("click 'View PDF'") is preferred as the
/// needle; otherwise any link whose label appears in the description wins.
pub fn fallback_link_match<'a>(action: &str, links: &'a [PageLink]) -> Option<&'a PageLink> {
    let action_lower = action.to_lowercase();

    let quoted = action_lower
        .split(['\'', '"', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}'])
        .nth(1)
        .map(str::trim)
        .filter(|q| !q.is_empty());

    if let Some(needle) = quoted {
        if let Some(link) = links
            .iter()
            .find(|l| l.label.to_lowercase().contains(needle))
        {
            return Some(link);
        }
    }

    links.iter().find(|l| {
        let label = l.label.trim().to_lowercase();
        label.chars().count() >= 3 && action_lower.contains(&label)
    })
}
