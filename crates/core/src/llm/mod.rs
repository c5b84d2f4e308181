//! LLM client abstraction and provider implementations.
//!
//! Every LLM-backed component talks to an `Arc<dyn LlmClient>`, so the
//! provider is chosen once at startup from [`LlmConfig`]. Structured output
//! goes through [`complete_json`], which fails loudly when the model does not
//! return the requested shape.

mod anthropic;
mod config;
mod ollama;
mod openai;

pub use anthropic::AnthropicClient;
pub use config::{LlmConfig, LlmProvider};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Error type for LLM operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::Http(e.to_string())
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmUsage {
    pub fn add(&mut self, other: LlmUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// An inline image attached to a completion request (vision models).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    /// MIME type, e.g. "image/png".
    pub media_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl ImageInput {
    pub fn png(bytes: &[u8]) -> Self {
        use base64::Engine;
        Self {
            media_type: "image/png".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Request for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (instructions for the model)
    pub system: Option<String>,
    /// User message
    pub prompt: String,
    /// Images sent alongside the user message
    pub images: Vec<ImageInput>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
    /// Ask the provider for a JSON object when it supports that natively
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            images: Vec::new(),
            max_tokens: 1024,
            temperature: 0.0,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.images.push(image);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text
    pub text: String,
    /// Token usage
    pub usage: LlmUsage,
    /// Model used
    pub model: String,
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "anthropic", "openai", "ollama")
    fn provider(&self) -> &str;

    /// Model name (e.g., "claude-3-haiku-20240307")
    fn model(&self) -> &str;

    /// Send a completion request and get a text response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Send a completion request and parse the response as JSON.
///
/// The outermost `{...}` span of the reply is deserialized into `T`; prose or
/// code fences around it are ignored. A reply that does not match `T` is an
/// [`LlmError::Json`].
pub async fn complete_json<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: CompletionRequest,
) -> Result<(T, LlmUsage), LlmError> {
    let response = client.complete(request.json()).await?;
    let parsed: T = serde_json::from_str(extract_json_object(&response.text))
        .map_err(|e| LlmError::Json(format!("{}: {}", e, response.text)))?;
    Ok((parsed, response.usage))
}

/// Slice out the outermost JSON object of a model reply.
pub fn extract_json_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Build the configured LLM client.
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let timeout = Duration::from_secs(config.timeout_secs as u64);
    let api_key = config.api_key.clone().unwrap_or_default();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Anthropic => {
            let mut client = AnthropicClient::new(api_key, &config.model).with_timeout(timeout);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
        LlmProvider::OpenAi => {
            let mut client = OpenAiClient::new(api_key, &config.model).with_timeout(timeout);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
        LlmProvider::Custom => {
            let base = config.api_base.as_ref().ok_or_else(|| {
                LlmError::NotConfigured("custom provider requires api_base".to_string())
            })?;
            Arc::new(
                OpenAiClient::new(api_key, &config.model)
                    .with_timeout(timeout)
                    .with_api_base(base)
                    .with_provider_name("custom"),
            )
        }
        LlmProvider::Ollama => {
            let mut client = OllamaClient::new(&config.model).with_timeout(timeout);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
    };

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlmClient;

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new("Hello")
            .with_system("You are helpful")
            .with_max_tokens(100)
            .with_temperature(0.5)
            .json();

        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.system, Some("You are helpful".to_string()));
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.temperature, 0.5);
        assert!(request.json_mode);
        assert!(request.images.is_empty());
    }

    #[test]
    fn test_image_input_data_url() {
        let image = ImageInput::png(&[1, 2, 3]);
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json_object("no json here"), "no json here");
        assert_eq!(extract_json_object("} backwards {"), "} backwards {");
    }

    #[derive(Debug, Deserialize)]
    struct Shape {
        value: u32,
    }

    #[tokio::test]
    async fn test_complete_json_parses() {
        let client = MockLlmClient::new();
        client.push_response("Sure! {\"value\": 7}");

        let (parsed, usage): (Shape, LlmUsage) =
            complete_json(&client, CompletionRequest::new("go")).await.unwrap();

        assert_eq!(parsed.value, 7);
        assert!(usage.input_tokens > 0);
        assert!(client.requests()[0].json_mode);
    }

    #[tokio::test]
    async fn test_complete_json_schema_mismatch_is_error() {
        let client = MockLlmClient::new();
        client.push_response("{\"other\": true}");

        let result: Result<(Shape, LlmUsage), LlmError> =
            complete_json(&client, CompletionRequest::new("go")).await;

        assert!(matches!(result, Err(LlmError::Json(_))));
    }

    #[test]
    fn test_usage_add() {
        let mut total = LlmUsage::default();
        total.add(LlmUsage { input_tokens: 10, output_tokens: 5 });
        total.add(LlmUsage { input_tokens: 1, output_tokens: 2 });
        assert_eq!(total, LlmUsage { input_tokens: 11, output_tokens: 7 });
    }

    #[test]
    fn test_create_custom_requires_base() {
        let config = LlmConfig {
            provider: LlmProvider::Custom,
            model: "m".to_string(),
            api_key: None,
            api_base: None,
            timeout_secs: 30,
            max_tokens: 1024,
        };
        assert!(matches!(
            create_llm_client(&config),
            Err(LlmError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_create_ollama_client() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            model: "llama3".to_string(),
            api_key: None,
            api_base: None,
            timeout_secs: 30,
            max_tokens: 1024,
        };
        let client = create_llm_client(&config).unwrap();
        assert_eq!(client.provider(), "ollama");
        assert_eq!(client.model(), "llama3");
    }
}
