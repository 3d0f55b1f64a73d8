//! Environment-driven configuration
//!
//! Values come from the process environment (optionally seeded from a
//! `.env` file by the binaries). Every key has a default so the service
//! starts without any configuration; external providers then degrade.

use crate::error::PlannerError;
use crate::Result;
use std::str::FromStr;
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    // API keys
    pub gemini_api_key: String,
    pub opentripmap_api_key: String,

    // LLM
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,

    // HTTP server
    pub api_host: String,
    pub api_port: u16,
    pub cors_origins: Vec<String>,

    pub log_level: String,

    // Tools
    pub max_attractions: usize,
    pub search_radius_km: u32,
    pub tool_timeout: Duration,
    pub generation_timeout: Duration,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:8501".to_string(),
                    "http://localhost:3000".to_string(),
                ]
            });

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY")
                .or_else(|| get("GOOGLE_API_KEY"))
                .unwrap_or_default(),
            opentripmap_api_key: get("OPENTRIPMAP_API_KEY").unwrap_or_default(),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            llm_temperature: parse_or("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), 0.7)?,
            llm_max_tokens: parse_or("LLM_MAX_TOKENS", get("LLM_MAX_TOKENS"), 2048)?,
            api_host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_or("API_PORT", get("PORT").or_else(|| get("API_PORT")), 8000)?,
            cors_origins,
            log_level: get("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            max_attractions: parse_or("MAX_ATTRACTIONS", get("MAX_ATTRACTIONS"), 15)?,
            search_radius_km: parse_or("SEARCH_RADIUS_KM", get("SEARCH_RADIUS_KM"), 10)?,
            tool_timeout: Duration::from_secs(parse_or(
                "TOOL_TIMEOUT_SECS",
                get("TOOL_TIMEOUT_SECS"),
                15,
            )?),
            generation_timeout: Duration::from_secs(parse_or(
                "GENERATION_TIMEOUT_SECS",
                get("GENERATION_TIMEOUT_SECS"),
                30,
            )?),
        })
    }

    /// Orchestrator-facing slice of the settings
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            max_attractions: self.max_attractions,
            tool_timeout: self.tool_timeout,
            generation_timeout: self.generation_timeout,
        }
    }
}

/// Limits the workflow applies to every planning run
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub max_attractions: usize,
    pub tool_timeout: Duration,
    pub generation_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_attractions: 15,
            tool_timeout: Duration::from_secs(15),
            generation_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| {
            PlannerError::ConfigError(format!("{} has an invalid value: {}", key, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.api_port, 8000);
        assert_eq!(settings.llm_model, "gemini-2.5-flash");
        assert_eq!(settings.max_attractions, 15);
        assert_eq!(settings.cors_origins.len(), 2);
        assert!(settings.gemini_api_key.is_empty());
        assert_eq!(settings.tool_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_overrides_and_aliases() {
        let settings = settings_from(&[
            ("GOOGLE_API_KEY", "g-key"),
            ("PORT", "9090"),
            ("API_PORT", "7070"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("LOG_LEVEL", "DEBUG"),
            ("TOOL_TIMEOUT_SECS", "3"),
        ])
        .unwrap();

        assert_eq!(settings.gemini_api_key, "g-key");
        assert_eq!(settings.api_port, 9090);
        assert_eq!(settings.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.workflow_config().tool_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = settings_from(&[("MAX_ATTRACTIONS", "many")]).unwrap_err();
        assert!(matches!(err, PlannerError::ConfigError(_)));
    }
}
