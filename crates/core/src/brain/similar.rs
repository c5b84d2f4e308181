//! Queries for pages similar to the one the user is reading.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::sync::Arc;

use crate::llm::{CompletionRequest, LlmClient, LlmUsage};
use crate::metrics;

use super::BrainError;

/// A generated similar-page query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarQuery {
    pub full_response: String,
    pub usage: LlmUsage,
}

/// Builds a search query that should surface pages like the current one.
pub struct SimilarQueryBuilder {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
    temperature: f32,
}

const WITH_QUERY_PROMPT: &str = r#"You write Google search queries that find pages similar to the one the user is reading, while keeping the intent of their original search.

You get the user's original query and a text chunk from the current page.
- Pull specific keywords from the text chunk and combine them with the original query; most words should come from the text chunk.
- Group alternatives with | and parentheses, join required concepts with AND.
- If the original query uses site:, inurl: or after: operators, keep them exactly as they are.

Respond with the search query only, no explanation."#;

const TEXT_ONLY_PROMPT: &str = r#"You write Google search queries that find pages similar to the one the user is reading.

You get a text chunk from the current page.
- Work out what the page is about.
- Use specific keywords from the text chunk to build a precise query.
- Group alternatives with | and parentheses, join required concepts with AND.

Respond with the search query only, no explanation."#;

static OPERATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:site|inurl|after):\S+").unwrap());

impl SimilarQueryBuilder {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: 400,
            temperature: 0.2,
        }
    }

    /// Search operators (`site:`, `inurl:`, `after:`) found in `query`.
    pub fn operators(query: &str) -> Vec<String> {
        OPERATORS
            .find_iter(query)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn build_prompt(original_query: Option<&str>, text_chunk: &str) -> (String, &'static str) {
        match original_query {
            Some(query) => (
                format!("User query: {}\n\nText chunk:\n{}", query, text_chunk),
                WITH_QUERY_PROMPT,
            ),
            None => (format!("Text chunk:\n{}", text_chunk), TEXT_ONLY_PROMPT),
        }
    }

    pub async fn build(
        &self,
        original_query: Option<&str>,
        text_chunk: &str,
        current_title: Option<&str>,
    ) -> Result<SimilarQuery, BrainError> {
        let original_query = original_query.map(str::trim).filter(|q| !q.is_empty());
        let current_title = current_title.map(str::trim).filter(|t| !t.is_empty());

        let (prompt, system) = Self::build_prompt(original_query, text_chunk);
        let request = CompletionRequest::new(prompt)
            .with_system(system)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let response = self.client.complete(request).await?;
        metrics::record_llm_usage(self.client.provider(), response.usage);

        let mut full_response = response
            .text
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\u{201c}' || c == '\u{201d}')
            .trim()
            .to_string();
        if full_response.is_empty() {
            return Err(BrainError::InvalidResponse(
                "similar query was empty".to_string(),
            ));
        }

        if let Some(original) = original_query {
            let present: Vec<String> = Self::operators(&full_response)
                .into_iter()
                .map(|op| op.to_lowercase())
                .collect();
            for op in Self::operators(original) {
                if !present.contains(&op.to_lowercase()) {
                    full_response.push(' ');
                    full_response.push_str(&op);
                }
            }
        }

        if let Some(title) = current_title {
            full_response.push_str(&format!(" -intitle:\"{}\"", title));
        }

        Ok(SimilarQuery {
            full_response,
            usage: response.usage,
        })
    }
}
