//! Environment-driven settings

use crate::coordinator::{CoordinatorConfig, DEFAULT_MAX_EVALUATIONS, DEFAULT_MAX_WORKER_STEPS};
use crate::error::CoordinatorError;
use crate::gemini::DEFAULT_MODEL;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub financial_api_base_url: Option<String>,
    pub coordinator: CoordinatorConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|&key| get(key));

        let defaults = CoordinatorConfig::default();

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port: parse_or(first(&["PORT", "API_PORT"]), "PORT", DEFAULT_PORT)?,
            database_url: first(&["DATABASE_URL", "POSTGRES_URL"]),
            financial_api_base_url: first(&["FINANCIAL_API_BASE_URL", "TOOLS_API_BASE_URL"]),
            coordinator: CoordinatorConfig {
                max_evaluations: parse_or(
                    get("COORDINATOR_MAX_EVALUATIONS"),
                    "COORDINATOR_MAX_EVALUATIONS",
                    DEFAULT_MAX_EVALUATIONS,
                )?,
                max_worker_steps: parse_or(
                    get("COORDINATOR_MAX_WORKER_STEPS"),
                    "COORDINATOR_MAX_WORKER_STEPS",
                    DEFAULT_MAX_WORKER_STEPS,
                )?,
                model_call_timeout: secs_or(get("MODEL_CALL_TIMEOUT_SECS"), "MODEL_CALL_TIMEOUT_SECS", defaults.model_call_timeout)?,
                tool_call_timeout: secs_or(get("TOOL_CALL_TIMEOUT_SECS"), "TOOL_CALL_TIMEOUT_SECS", defaults.tool_call_timeout)?,
                turn_timeout: secs_or(get("TURN_TIMEOUT_SECS"), "TURN_TIMEOUT_SECS", defaults.turn_timeout)?,
            },
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| CoordinatorError::ConfigError(format!("{} has invalid value '{}'", key, raw))),
    }
}

fn secs_or(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    let secs: u64 = parse_or(value, key, default.as_secs())?;
    if secs == 0 {
        return Err(CoordinatorError::ConfigError(format!("{} must be positive", key)));
    }
    Ok(Duration::from_secs(secs))
}
