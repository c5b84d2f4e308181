//! Screenshot rendering and interactive-action detection.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::brain::BrainError;
use crate::llm::{complete_json, CompletionRequest, ImageInput, LlmClient, LlmUsage};

use super::FetchError;

/// Renders a page to an image.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// PNG screenshot of the page.
    async fn screenshot(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// An interaction needed to reveal the content the user is after,
/// e.g. "click the 'View PDF' button".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescription {
    pub description: String,
}

/// Result of looking at a screenshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionDetection {
    pub action: Option<ActionDescription>,
    pub usage: LlmUsage,
}

/// Decides from a screenshot whether the page needs an interaction first.
#[async_trait]
pub trait ActionDetector: Send + Sync {
    async fn detect_required_action(
        &self,
        image: &[u8],
        query: &str,
    ) -> Result<ActionDetection, BrainError>;
}

/// Screenshot service reached over HTTP: `GET {render_url}?url=<page>`
/// returning image bytes.
pub struct HttpRenderer {
    client: Client,
    render_url: String,
}

impl HttpRenderer {
    pub fn new(render_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self {
            client,
            render_url: render_url.into(),
        })
    }

    fn request_url(&self, page: &str) -> String {
        let separator = if self.render_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}url={}",
            self.render_url,
            separator,
            urlencoding::encode(page)
        )
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    fn name(&self) -> &str {
        "http"
    }

    async fn screenshot(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(self.request_url(url))
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;
        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(bytes.to_vec())
    }
}

/// Renderer used when no screenshot service is configured.
#[derive(Debug, Default, Clone)]
pub struct NoRenderer;

#[async_trait]
impl PageRenderer for NoRenderer {
    fn name(&self) -> &str {
        "none"
    }

    async fn screenshot(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Unavailable("no renderer configured".to_string()))
    }
}

/// Vision-model action detector.
pub struct LlmActionDetector {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    action: Option<String>,
}

const ACTION_SYSTEM_PROMPT: &str = r#"You look at a screenshot of a web page that a user reached while searching.

Decide whether the content they need is already visible, or whether they must first click something (for example "View PDF", "Read more", "Full text", "Download paper").

Respond with JSON only, no other text:
{"action": "click the 'View PDF' link"}
or, when nothing needs to be clicked:
{"action": null}"#;

impl LlmActionDetector {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: 200,
        }
    }

    fn interpret(raw: Option<String>) -> Option<ActionDescription> {
        let description = raw?.trim().to_string();
        let lower = description.to_lowercase();
        let negative = ["", "null", "none", "no", "n/a", "no action", "nothing"];
        if negative.contains(&lower.trim_end_matches('.')) {
            return None;
        }
        Some(ActionDescription { description })
    }
}

#[async_trait]
impl ActionDetector for LlmActionDetector {
    async fn detect_required_action(
        &self,
        image: &[u8],
        query: &str,
    ) -> Result<ActionDetection, BrainError> {
        let request = CompletionRequest::new(format!("The user searched for: {}", query))
            .with_system(ACTION_SYSTEM_PROMPT)
            .with_image(ImageInput::png(image))
            .with_max_tokens(self.max_tokens);

        let (response, usage) =
            complete_json::<ActionResponse>(self.client.as_ref(), request).await?;

        Ok(ActionDetection {
            action: Self::interpret(response.action),
            usage,
        })
    }
}
