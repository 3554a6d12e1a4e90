use anyhow::{Context, Result};

use crate::cache::{DEFAULT_CACHE_PREFIX, DEFAULT_TTL_HOURS};
use crate::llm_client::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Application configuration loaded from environment variables.
/// Every variable has a default; a missing API key only disables analysis.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub anthropic_api_key: Option<String>,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f64,
    pub llm_timeout_secs: u64,
    pub redis_url: Option<String>,
    pub cache_prefix: String,
    pub cache_ttl_hours: i64,
    pub cache_digest: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            port: parse_or(var("PORT"), 8080, "PORT must be a valid port number")?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            llm_model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_max_tokens: parse_or(
                var("LLM_MAX_TOKENS"),
                DEFAULT_MAX_TOKENS,
                "LLM_MAX_TOKENS must be a positive integer",
            )?,
            llm_temperature: parse_or(
                var("LLM_TEMPERATURE"),
                DEFAULT_TEMPERATURE,
                "LLM_TEMPERATURE must be a number",
            )?,
            llm_timeout_secs: parse_or(
                var("LLM_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT_SECS,
                "LLM_TIMEOUT_SECS must be a positive integer",
            )?,
            redis_url: var("REDIS_URL"),
            cache_prefix: var("CACHE_PREFIX").unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string()),
            cache_ttl_hours: parse_or(
                var("CACHE_TTL_HOURS"),
                DEFAULT_TTL_HOURS,
                "CACHE_TTL_HOURS must be an integer",
            )?,
            cache_digest: var("CACHE_DIGEST").unwrap_or_else(|| "sha256".to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T, message: &'static str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw.trim().parse::<T>().context(message),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.llm_model, DEFAULT_MODEL);
        assert_eq!(config.llm_max_tokens, 4096);
        assert_eq!(config.cache_prefix, "analysis_cache");
        assert_eq!(config.cache_ttl_hours, 24);
        assert_eq!(config.cache_digest, "sha256");
        assert!(config.anthropic_api_key.is_none());
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_values_are_read_and_parsed() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("LLM_TEMPERATURE", "0.5"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("CACHE_TTL_HOURS", "6"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.anthropic_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm_temperature, 0.5);
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.cache_ttl_hours, 6);
    }

    #[test]
    fn test_blank_api_key_counts_as_unset() {
        let config = config_from(&[("ANTHROPIC_API_KEY", "  ")]).unwrap();
        assert!(config.anthropic_api_key.is_none());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
