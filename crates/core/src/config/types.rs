use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::depth::DepthConfig;
use crate::llm::{LlmConfig, LlmProvider};
use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub depth: DepthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Available search backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    #[default]
    Serper,
}

/// Web search backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub backend: SearchBackend,
    /// API key (may reference an env var as `${VAR_NAME}`)
    pub api_key: String,
    /// Backend base URL (default: "https://google.serper.dev")
    #[serde(default = "default_search_api_base")]
    pub api_base: String,
    /// Results kept per retrieval (1-10, default: 8)
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u32,
}

fn default_search_api_base() -> String {
    "https://google.serper.dev".to_string()
}

fn default_result_limit() -> usize {
    8
}

fn default_search_timeout() -> u32 {
    15
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub search: SanitizedSearchConfig,
    pub llm: SanitizedLlmConfig,
    pub orchestrator: OrchestratorConfig,
    pub depth: DepthConfig,
}

/// Sanitized search config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearchConfig {
    pub backend: SearchBackend,
    pub api_base: String,
    pub api_key_configured: bool,
    pub result_limit: usize,
    pub timeout_secs: u32,
}

/// Sanitized LLM config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub max_tokens: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            search: SanitizedSearchConfig {
                backend: config.search.backend,
                api_base: config.search.api_base.clone(),
                api_key_configured: !config.search.api_key.is_empty(),
                result_limit: config.search.result_limit,
                timeout_secs: config.search.timeout_secs,
            },
            llm: SanitizedLlmConfig {
                provider: config.llm.provider.clone(),
                model: config.llm.model.clone(),
                api_base: config.llm.api_base.clone(),
                api_key_configured: config
                    .llm
                    .api_key
                    .as_ref()
                    .map(|k| !k.is_empty())
                    .unwrap_or(false),
                timeout_secs: config.llm.timeout_secs,
                max_tokens: config.llm.max_tokens,
            },
            orchestrator: config.orchestrator.clone(),
            depth: config.depth.clone(),
        }
    }
}
