use serde::{Deserialize, Serialize};

/// LLM provider type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Anthropic Claude API.
    Anthropic,
    /// OpenAI API (GPT models).
    OpenAi,
    /// Local Ollama instance.
    Ollama,
    /// Custom HTTP endpoint (must be OpenAI-compatible, e.g. Groq).
    Custom,
}

/// LLM client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider.
    pub provider: LlmProvider,
    /// Model name/identifier. Must accept images when depth exploration
    /// runs with a renderer.
    pub model: String,
    /// API key (can reference env var with ${VAR_NAME}).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL (for proxies or self-hosted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Maximum tokens for completions.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_timeout() -> u32 {
    30
}

fn default_max_tokens() -> u32 {
    1024
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("llm.model cannot be empty".to_string());
        }

        if self.provider != LlmProvider::Ollama && self.api_key.is_none() && self.api_base.is_none()
        {
            return Err(format!(
                "LLM provider {:?} requires api_key or api_base",
                self.provider
            ));
        }

        if self.provider == LlmProvider::Custom && self.api_base.is_none() {
            return Err("custom LLM provider requires api_base".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("llm.timeout_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            provider,
            model: "model".to_string(),
            api_key: None,
            api_base: None,
            timeout_secs: 30,
            max_tokens: 1024,
        }
    }

    #[test]
    fn test_ollama_needs_no_key() {
        assert!(config(LlmProvider::Ollama).validate().is_ok());
    }

    #[test]
    fn test_proxy_base_without_key_ok() {
        let mut c = config(LlmProvider::Anthropic);
        c.api_base = Some("http://localhost:5000".to_string());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_custom_requires_base() {
        let mut c = config(LlmProvider::Custom);
        c.api_key = Some("gsk".to_string());
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_empty_model_fails() {
        let mut c = config(LlmProvider::Ollama);
        c.model = " ".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_provider_serde() {
        let p: LlmProvider = serde_json::from_str("\"open_ai\"").unwrap();
        assert_eq!(p, LlmProvider::OpenAi);
    }
}
