//! Natural-language to search-operator query rewriting.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::sync::Arc;

use crate::llm::{CompletionRequest, LlmClient, LlmUsage};
use crate::metrics;

use super::{normalize_whitespace, BrainError};

/// A rewritten query.
#[derive(Debug, Clone, PartialEq)]
pub struct Reformulation {
    pub advanced_query: String,
    pub usage: LlmUsage,
}

/// Rewrites a query into search-engine syntax (`|`, `AND`, `site:`,
/// `after:` ...) with an LLM that reasons step by step and ends with a
/// `final result:` line.
pub struct QueryReformulator {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

const REFORMULATE_SYSTEM_PROMPT: &str = r#"You convert natural-language search queries into advanced Google search queries.

Work through these steps, briefly explaining each:
1. Classify the query as "research paper", "technical example", "supportive evidence" or "other".
2. Describe what the user wants beyond the literal words of the query.
3. List words likely to appear in the titles and bodies of the pages they want: synonyms and related technical terms.
4. Build an optimized query with these operators as needed: | (or), AND, site:, () for grouping, "" for exact match, after: (YYYY or YYYY-MM-DD).

Rules:
- The current date is {DATE}.
- If the query asks for the latest work, use after: with a year two years before the current date and do not add synonyms for "latest".
- For comparisons, add (comparison | compare | improvement | benchmark).
- Only use site: for "research paper", "technical example" and "supportive evidence" queries.
    - research paper: site:arxiv.org | site:nature.com | site:.org | site:.edu | site:.gov | inurl:doi
    - technical example: site:github.com | site:stackoverflow.com | site:medium.com | site:huggingface.co
    - supportive evidence: site:reuters.com | site:apnews.com | site:bbc.com | site:.gov
- Group multi-word synonyms in parentheses, e.g. ((protein structure) | (protein modeling)).
- Avoid "" unless you also give many synonyms.

End with the optimized query on its own line, after the exact text "final result:"."#;

static FINAL_RESULT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)final result:").unwrap());

impl QueryReformulator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn system_prompt(date: NaiveDate) -> String {
        REFORMULATE_SYSTEM_PROMPT.replace("{DATE}", &date.format("%Y-%m-%d").to_string())
    }

    /// Text after the last `final result:` marker, or the whole response
    /// when there is none. Trimmed, quote-stripped and lowercased.
    pub fn extract_final_result(response: &str) -> String {
        let tail = match FINAL_RESULT_MARKER.find_iter(response).last() {
            Some(m) => &response[m.end()..],
            None => response,
        };
        let cleaned = tail
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\u{201c}' || c == '\u{201d}' || c == '`')
            .trim();
        normalize_whitespace(cleaned).to_lowercase()
    }

    pub async fn reformulate(
        &self,
        query: &str,
        date: NaiveDate,
    ) -> Result<Reformulation, BrainError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BrainError::EmptyQuery);
        }

        let request = CompletionRequest::new(query)
            .with_system(Self::system_prompt(date))
            .with_max_tokens(self.max_tokens)
            .with_temperature(0.0);

        let response = self.client.complete(request).await?;
        metrics::record_llm_usage(self.client.provider(), response.usage);

        let advanced_query = Self::extract_final_result(&response.text);
        if advanced_query.is_empty() {
            return Err(BrainError::InvalidResponse(
                "reformulation produced an empty query".to_string(),
            ));
        }

        Ok(Reformulation {
            advanced_query,
            usage: response.usage,
        })
    }
}
