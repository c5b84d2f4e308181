//! Query intent classification.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::category::Category;
use crate::llm::{complete_json, CompletionRequest, LlmClient, LlmUsage};
use crate::metrics;

/// Outcome of classifying a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    /// True when the classifier could not decide and General was assumed.
    pub fallback: bool,
    pub usage: LlmUsage,
}

impl Classification {
    fn decided(category: Category, usage: LlmUsage) -> Self {
        Self {
            category,
            fallback: false,
            usage,
        }
    }

    fn fallback(usage: LlmUsage) -> Self {
        Self {
            category: Category::General,
            fallback: true,
            usage,
        }
    }
}

/// Assigns a [`Category`] to a query. Never fails: anything unrecognized
/// becomes [`Category::General`].
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    /// Name of this classifier for logging.
    fn name(&self) -> &str;

    async fn classify(&self, query: &str) -> Classification;
}

/// Classifier backed by an LLM structured call.
pub struct LlmClassifier {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClassifierResponse {
    category: serde_json::Value,
}

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You classify web search queries by what kind of source would answer them.

Categories:
0 = research paper: the user wants academic papers, studies, preprints or reviews
1 = technical example: the user wants code, an implementation, a tutorial or a worked example
2 = general: anything else
3 = supportive evidence: the user wants evidence, statistics or reporting for or against a claim

Respond with JSON only, no other text:
{"category": <number>}"#;

impl LlmClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: 32,
        }
    }

    fn interpret(value: &serde_json::Value) -> Option<Category> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|code| u8::try_from(code).ok())
                .and_then(Category::from_code),
            serde_json::Value::String(s) => Category::parse(s),
            _ => None,
        }
    }
}

#[async_trait]
impl QueryClassifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn classify(&self, query: &str) -> Classification {
        let request = CompletionRequest::new(format!("Query: {}", query))
            .with_system(CLASSIFIER_SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens);

        let classification =
            match complete_json::<ClassifierResponse>(self.client.as_ref(), request).await {
                Ok((response, usage)) => match Self::interpret(&response.category) {
                    Some(category) => Classification::decided(category, usage),
                    None => {
                        warn!(value = %response.category, "Unrecognized category, using general");
                        Classification::fallback(usage)
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Classification failed, using general");
                    Classification::fallback(LlmUsage::default())
                }
            };

        record(&classification);
        debug!(category = %classification.category, "Query classified");
        classification
    }
}

/// Offline heuristic classifier. Looks for intent words in the query.
#[derive(Debug, Default, Clone)]
pub struct KeywordClassifier;

const RESEARCH_WORDS: &[&str] = &[
    "research", "paper", "papers", "study", "studies", "journal", "arxiv", "preprint",
    "meta-analysis", "literature",
];
const TECHNICAL_WORDS: &[&str] = &[
    "code", "example", "examples", "implementation", "implement", "implementing", "github",
    "tutorial", "library", "snippet", "sample",
];
const EVIDENCE_WORDS: &[&str] = &[
    "evidence", "argument", "arguments", "proof", "prove", "statistics", "stats", "claim",
    "debunk", "fact",
];

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_text(query: &str) -> Option<Category> {
        let lower = query.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| !w.is_empty())
            .collect();
        let mentions = |vocab: &[&str]| words.iter().any(|w| vocab.contains(w));

        if mentions(RESEARCH_WORDS) {
            Some(Category::ResearchPaper)
        } else if mentions(TECHNICAL_WORDS) {
            Some(Category::TechnicalExample)
        } else if mentions(EVIDENCE_WORDS) {
            Some(Category::SupportiveEvidence)
        } else {
            None
        }
    }
}

#[async_trait]
impl QueryClassifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, query: &str) -> Classification {
        let classification = match Self::classify_text(query) {
            Some(category) => Classification::decided(category, LlmUsage::default()),
            None => Classification::fallback(LlmUsage::default()),
        };
        record(&classification);
        classification
    }
}

fn record(classification: &Classification) {
    let category = serde_json::to_value(classification.category)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    metrics::CLASSIFICATIONS_TOTAL
        .with_label_values(&[&category, if classification.fallback { "true" } else { "false" }])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::testing::MockLlmClient;

    #[tokio::test]
    async fn test_llm_classifier_numeric_code() {
        let client = Arc::new(MockLlmClient::new());
        client.push_response(r#"{"category": 0}"#);
        let classifier = LlmClassifier::new(client.clone());

        let result = classifier
            .classify("research papers on protein structure prediction")
            .await;

        assert_eq!(result.category, Category::ResearchPaper);
        assert!(!result.fallback);
        assert!(client.requests()[0].prompt.contains("protein structure"));
    }

    #[tokio::test]
    async fn test_llm_classifier_string_label() {
        let client = Arc::new(MockLlmClient::new());
        client.push_response(r#"{"category": "technical example"}"#);
        let classifier = LlmClassifier::new(client);

        let result = classifier.classify("rust async examples").await;
        assert_eq!(result.category, Category::TechnicalExample);
    }

    #[tokio::test]
    async fn test_llm_classifier_unknown_value_falls_back() {
        let client = Arc::new(MockLlmClient::new());
        client.push_response(r#"{"category": 42}"#);
        let classifier = LlmClassifier::new(client);

        let result = classifier.classify("something").await;
        assert_eq!(result.category, Category::General);
        assert!(result.fallback);
    }

    #[tokio::test]
    async fn test_llm_classifier_error_falls_back() {
        let client = Arc::new(MockLlmClient::new());
        client.push_error(LlmError::Http("connection refused".to_string()));
        let classifier = LlmClassifier::new(client);

        let result = classifier.classify("anything").await;
        assert_eq!(result.category, Category::General);
        assert!(result.fallback);
    }

    #[tokio::test]
    async fn test_llm_classifier_malformed_json_falls_back() {
        let client = Arc::new(MockLlmClient::new());
        client.push_response("I think this is research.");
        let classifier = LlmClassifier::new(client);

        assert_eq!(classifier.classify("x").await.category, Category::General);
    }

    #[test]
    fn test_keyword_classifier() {
        assert_eq!(
            KeywordClassifier::classify_text("Research papers on protein folding"),
            Some(Category::ResearchPaper)
        );
        assert_eq!(
            KeywordClassifier::classify_text("examples of knowledge graphs in llm inference"),
            Some(Category::TechnicalExample)
        );
        assert_eq!(
            KeywordClassifier::classify_text("evidence that remote work improves productivity"),
            Some(Category::SupportiveEvidence)
        );
        assert_eq!(
            KeywordClassifier::classify_text("how to set up a home network"),
            None
        );
    }

    #[tokio::test]
    async fn test_keyword_classifier_defaults_to_general() {
        let result = KeywordClassifier::new().classify("best pizza in naples").await;
        assert_eq!(result.category, Category::General);
        assert!(result.fallback);
        assert_eq!(result.usage, LlmUsage::default());
    }
}
