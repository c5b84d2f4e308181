use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Overrides use the `AUTOSEARCH_` prefix with `__` between nesting levels,
/// e.g. `AUTOSEARCH_SEARCH__API_KEY`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("AUTOSEARCH_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    resolve_secrets(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config =
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    resolve_secrets(config)
}

/// Replace `${VAR}` references in secret fields with the variable's value.
fn resolve_secrets(mut config: Config) -> Result<Config, ConfigError> {
    config.search.api_key = resolve_env_reference(&config.search.api_key)?;
    if let Some(key) = &config.llm.api_key {
        config.llm.api_key = Some(resolve_env_reference(key)?);
    }
    Ok(config)
}

fn resolve_env_reference(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    match trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(var) => std::env::var(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string())),
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = r#"
[server]
port = 9000

[search]
api_key = "serper-key"

[llm]
provider = "ollama"
model = "llama3"
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(VALID).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.search.api_key, "serper-key");
    }

    #[test]
    fn test_load_config_from_str_missing_llm() {
        let toml = r#"
[search]
api_key = "k"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[search]
api_key = "serper-key"
result_limit = 5

[llm]
provider = "anthropic"
model = "claude-3-haiku-20240307"
api_key = "sk-test"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.search.result_limit, 5);
    }

    #[test]
    fn test_env_reference_resolved() {
        std::env::set_var("AUTOSEARCH_TEST_SERPER_KEY", "from-env");
        let toml = r#"
[search]
api_key = "${AUTOSEARCH_TEST_SERPER_KEY}"

[llm]
provider = "ollama"
model = "llama3"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.search.api_key, "from-env");
    }

    #[test]
    fn test_env_reference_missing() {
        let toml = r#"
[search]
api_key = "${AUTOSEARCH_TEST_DEFINITELY_UNSET}"

[llm]
provider = "ollama"
model = "llama3"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "AUTOSEARCH_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn test_plain_value_untouched() {
        assert_eq!(resolve_env_reference("abc").unwrap(), "abc");
        assert_eq!(resolve_env_reference("${").unwrap(), "${");
    }
}
