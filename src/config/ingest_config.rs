//! Ingestion configuration parsing from environment variables.

use crate::application::ingest::{DEFAULT_UNITS, IngestSettings};
use std::collections::BTreeSet;
use std::env;

/// Ingestion environment configuration
#[derive(Debug, Clone)]
pub struct IngestEnvConfig {
    pub default_suite: String,
    pub allowed_units: BTreeSet<String>,
}

impl Default for IngestEnvConfig {
    fn default() -> Self {
        let settings = IngestSettings::default();
        Self {
            default_suite: settings.default_suite,
            allowed_units: settings.allowed_units,
        }
    }
}

impl IngestEnvConfig {
    pub fn from_env() -> Self {
        let default_suite = env::var("DEFAULT_SUITE")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Benchmark".to_string());

        let allowed_units = env::var("ALLOWED_UNITS")
            .map(|list| Self::parse_units(&list))
            .ok()
            .filter(|units| !units.is_empty())
            .unwrap_or_else(|| DEFAULT_UNITS.iter().map(|u| u.to_string()).collect());

        Self {
            default_suite,
            allowed_units,
        }
    }

    fn parse_units(list: &str) -> BTreeSet<String> {
        list.split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn settings(&self) -> IngestSettings {
        IngestSettings {
            default_suite: self.default_suite.clone(),
            allowed_units: self.allowed_units.clone(),
        }
    }
}
