//! LLM relevance judgment over a retrieval batch.
//!
//! The first pass sees only the original query and the initial batch and
//! returns the relevant positions plus follow-up queries for what is still
//! missing. The second pass judges a follow-up batch against that gap and
//! returns positions only, so expansion stops after one level.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::category::Category;
use crate::llm::{complete_json, CompletionRequest, LlmClient, LlmUsage};
use crate::metrics;
use crate::searcher::SearchResult;

use super::{normalize_whitespace, token_set, BrainError};

/// Output of one relevance judgment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JudgmentResult {
    /// Positions of relevant results; always a subset of the batch's positions.
    pub relevant_positions: Vec<usize>,
    /// Follow-up queries (first pass only).
    pub additional_queries: Vec<String>,
    /// The information gap the follow-ups are meant to close.
    pub missing_information: Option<String>,
    pub reasoning: String,
    #[serde(skip)]
    pub usage: LlmUsage,
}

impl JudgmentResult {
    /// Results from `batch` at the selected positions, in batch order.
    pub fn select(&self, batch: &[SearchResult]) -> Vec<SearchResult> {
        batch
            .iter()
            .filter(|r| self.relevant_positions.contains(&r.position))
            .cloned()
            .collect()
    }
}

/// Scores a result batch for relevance and credibility.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    /// Name of this judge for logging.
    fn name(&self) -> &str;

    /// Judge the initial batch and propose follow-up queries.
    async fn first_pass(
        &self,
        category: Category,
        query: &str,
        batch: &[SearchResult],
    ) -> Result<JudgmentResult, BrainError>;

    /// Judge a follow-up batch. `accumulated` is what the run already holds.
    async fn second_pass(
        &self,
        category: Category,
        query: &str,
        batch: &[SearchResult],
        missing_information: Option<&str>,
        accumulated: &[SearchResult],
    ) -> Result<JudgmentResult, BrainError>;
}

/// Configuration for the LLM judge.
#[derive(Debug, Clone)]
pub struct LlmJudgeConfig {
    /// Maximum follow-up queries kept from the first pass.
    pub max_additional_queries: usize,
    /// Maximum tokens for the LLM response.
    pub max_tokens: u32,
    /// Temperature for generation.
    pub temperature: f32,
}

impl Default for LlmJudgeConfig {
    fn default() -> Self {
        Self {
            max_additional_queries: 3,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

/// Relevance judge backed by an LLM structured call.
pub struct LlmJudge {
    client: Arc<dyn LlmClient>,
    config: LlmJudgeConfig,
}

#[derive(Debug, Deserialize)]
struct FirstPassResponse {
    #[serde(default)]
    reasoning: String,
    relevant_positions: Vec<i64>,
    additional_queries: Vec<String>,
    #[serde(default)]
    missing_information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecondPassResponse {
    #[serde(default)]
    reasoning: String,
    relevant_positions: Vec<i64>,
}

impl LlmJudge {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            config: LlmJudgeConfig::default(),
        }
    }

    pub fn with_config(client: Arc<dyn LlmClient>, config: LlmJudgeConfig) -> Self {
        Self { client, config }
    }

    fn rubric_section(category: Category) -> String {
        let rubric = category.rubric();
        format!(
            "The query is a {} search.\nCredibility: {}\nRelevance: {}",
            category.label(),
            rubric.credibility,
            rubric.relevance
        )
    }

    fn build_first_pass_system(&self, category: Category) -> String {
        format!(
            r#"You evaluate web search results for a user's query.

{}

Select the positions of the results that are both credible and relevant, best first. Then decide what information the user needs that these results do not cover, and write up to {} additional search queries to find it. Each additional query must differ meaningfully from the original query and from the other additional queries; do not just reorder or restate words.

Respond with JSON only, no other text:
{{
  "reasoning": "brief explanation",
  "relevant_positions": [0, 2],
  "additional_queries": ["query one", "query two"],
  "missing_information": "what is still missing, or null"
}}"#,
            Self::rubric_section(category),
            self.config.max_additional_queries
        )
    }

    fn build_second_pass_system(category: Category) -> String {
        format!(
            r#"You evaluate follow-up web search results that were run to fill a gap in earlier results.

{}

Select the positions of the results that are credible, relevant to the original query, and add something the earlier results lack. Do not select results that repeat sources already found.

Respond with JSON only, no other text:
{{
  "reasoning": "brief explanation",
  "relevant_positions": [1, 3]
}}"#,
            Self::rubric_section(category)
        )
    }

    fn format_batch(batch: &[SearchResult]) -> String {
        if batch.is_empty() {
            return "(no results)".to_string();
        }
        batch
            .iter()
            .map(|r| format!("[{}] {}\n{}\n{}", r.position, r.title, r.link, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn build_second_pass_prompt(
        query: &str,
        batch: &[SearchResult],
        missing_information: Option<&str>,
        accumulated: &[SearchResult],
    ) -> String {
        let mut prompt = format!("Original query: {}\n", query);
        if let Some(missing) = missing_information {
            prompt.push_str(&format!("Missing information: {}\n", missing));
        }
        if !accumulated.is_empty() {
            prompt.push_str("\nAlready found:\n");
            for r in accumulated {
                prompt.push_str(&format!("- {} ({})\n", r.title, r.link));
            }
        }
        prompt.push_str("\nNew results:\n");
        prompt.push_str(&Self::format_batch(batch));
        prompt
    }

    /// Keep only positions present in the batch, first occurrence wins.
    fn filter_positions(raw: &[i64], batch: &[SearchResult]) -> Vec<usize> {
        let valid: HashSet<usize> = batch.iter().map(|r| r.position).collect();
        let mut seen = HashSet::new();
        raw.iter()
            .filter_map(|&p| usize::try_from(p).ok())
            .filter(|p| valid.contains(p) && seen.insert(*p))
            .collect()
    }

    /// Normalize follow-ups and drop those that restate the original or an
    /// earlier follow-up.
    fn filter_queries(&self, original: &str, raw: Vec<String>) -> Vec<String> {
        let mut seen = vec![token_set(original)];
        let mut kept = Vec::new();
        for query in raw {
            let query = normalize_whitespace(&query);
            if query.is_empty() {
                continue;
            }
            let tokens = token_set(&query);
            if seen.contains(&tokens) {
                continue;
            }
            seen.push(tokens);
            kept.push(query);
            if kept.len() >= self.config.max_additional_queries {
                break;
            }
        }
        kept
    }

    fn record(&self, pass: &str, usage: Option<LlmUsage>) {
        let result = if usage.is_some() { "success" } else { "error" };
        metrics::JUDGMENTS_TOTAL
            .with_label_values(&[pass, result])
            .inc();
        if let Some(usage) = usage {
            metrics::record_llm_usage(self.client.provider(), usage);
        }
    }
}

#[async_trait]
impl RelevanceJudge for LlmJudge {
    fn name(&self) -> &str {
        "llm"
    }

    async fn first_pass(
        &self,
        category: Category,
        query: &str,
        batch: &[SearchResult],
    ) -> Result<JudgmentResult, BrainError> {
        let request = CompletionRequest::new(format!(
            "Original query: {}\n\nResults:\n{}",
            query,
            Self::format_batch(batch)
        ))
        .with_system(self.build_first_pass_system(category))
        .with_max_tokens(self.config.max_tokens)
        .with_temperature(self.config.temperature);

        let (response, usage) =
            match complete_json::<FirstPassResponse>(self.client.as_ref(), request).await {
                Ok(ok) => ok,
                Err(e) => {
                    self.record("first", None);
                    return Err(e.into());
                }
            };
        self.record("first", Some(usage));

        let relevant_positions = Self::filter_positions(&response.relevant_positions, batch);
        let additional_queries = self.filter_queries(query, response.additional_queries);
        let missing_information = response
            .missing_information
            .map(|m| normalize_whitespace(&m))
            .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case("null"));

        debug!(
            relevant = relevant_positions.len(),
            follow_ups = additional_queries.len(),
            "First-pass judgment"
        );

        Ok(JudgmentResult {
            relevant_positions,
            additional_queries,
            missing_information,
            reasoning: response.reasoning,
            usage,
        })
    }

    async fn second_pass(
        &self,
        category: Category,
        query: &str,
        batch: &[SearchResult],
        missing_information: Option<&str>,
        accumulated: &[SearchResult],
    ) -> Result<JudgmentResult, BrainError> {
        if batch.is_empty() {
            metrics::JUDGMENTS_TOTAL
                .with_label_values(&["second", "skipped"])
                .inc();
            return Ok(JudgmentResult::default());
        }

        let request = CompletionRequest::new(Self::build_second_pass_prompt(
            query,
            batch,
            missing_information,
            accumulated,
        ))
        .with_system(Self::build_second_pass_system(category))
        .with_max_tokens(self.config.max_tokens)
        .with_temperature(self.config.temperature);

        let (response, usage) =
            match complete_json::<SecondPassResponse>(self.client.as_ref(), request).await {
                Ok(ok) => ok,
                Err(e) => {
                    self.record("second", None);
                    return Err(e.into());
                }
            };
        self.record("second", Some(usage));

        Ok(JudgmentResult {
            relevant_positions: Self::filter_positions(&response.relevant_positions, batch),
            additional_queries: Vec::new(),
            missing_information: None,
            reasoning: response.reasoning,
            usage,
        })
    }
}
