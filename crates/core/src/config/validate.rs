use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Search key present and result limit in 1..=10
/// - LLM settings (model, key requirements)
/// - Orchestrator and depth bounds
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.search.api_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "search.api_key cannot be empty".to_string(),
        ));
    }

    if !(1..=10).contains(&config.search.result_limit) {
        return Err(ConfigError::ValidationError(format!(
            "search.result_limit must be between 1 and 10, got {}",
            config.search.result_limit
        )));
    }

    config
        .llm
        .validate()
        .map_err(ConfigError::ValidationError)?;
    config
        .orchestrator
        .validate()
        .map_err(ConfigError::ValidationError)?;
    config
        .depth
        .validate()
        .map_err(ConfigError::ValidationError)?;

    Ok(())
}
