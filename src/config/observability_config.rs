//! Observability configuration parsing from environment variables.
//!
//! This module handles logging format and metrics configuration.

use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid LOG_FORMAT: {}. Must be 'pretty' or 'json'", s),
        }
    }
}

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Self {
        Self {
            metrics_enabled: env::var("METRICS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<bool>()
                .unwrap_or(true),
            log_format: env::var("LOG_FORMAT")
                .ok()
                .and_then(|s| LogFormat::from_str(&s).ok())
                .unwrap_or_default(),
        }
    }
}
