//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::crm::CrmConfig;
use crate::error::ConfigError;
use crate::llm::{GeneratorConfig, LlmConfig};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct CopilotConfig {
    /// HTTP listen port.
    pub port: u16,
    /// libSQL database file. `None` keeps jobs in memory.
    pub db_path: Option<PathBuf>,
    /// Directory for daily rolling log files, if any.
    pub log_dir: Option<PathBuf>,
    pub crm: CrmConfig,
    pub llm: LlmConfig,
    pub generator: GeneratorConfig,
}

impl CopilotConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("COPILOT_LLM_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let llm = LlmConfig {
            base_url: get("COPILOT_LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: SecretString::from(api_key),
            model: get("COPILOT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(parse_or(&get, "COPILOT_LLM_TIMEOUT_SECS", 60)?),
        };

        let defaults = GeneratorConfig::default();
        let generator = GeneratorConfig {
            temperature: parse_or(&get, "COPILOT_TEMPERATURE", defaults.temperature)?,
            max_tokens: parse_or(&get, "COPILOT_MAX_TOKENS", defaults.max_tokens)?,
        };
        if !(0.0..=2.0).contains(&generator.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "COPILOT_TEMPERATURE".to_string(),
                message: format!("must be between 0 and 2, got {}", generator.temperature),
            });
        }

        let crm = CrmConfig {
            base_url: get("CRM_API_BASE_URL").unwrap_or_else(|| CrmConfig::default().base_url),
            api_token: get("CRM_API_TOKEN").map(SecretString::from),
            timeout: Duration::from_secs(parse_or(&get, "CRM_TIMEOUT_SECS", 30)?),
        };

        Ok(Self {
            port: parse_or(&get, "COPILOT_PORT", 8080)?,
            db_path: get("COPILOT_DB_PATH").map(PathBuf::from),
            log_dir: get("COPILOT_LOG_DIR").map(PathBuf::from),
            crm,
            llm,
            generator,
        })
    }
}

/// Parse `key` if set, otherwise fall back to `default`.
fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}
