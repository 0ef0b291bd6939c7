//! Configuration module for benchtrail.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Store, Detector, Ingest, and Observability.

mod detector_config;
mod ingest_config;
mod observability_config;
mod store_config;

pub use detector_config::DetectorEnvConfig;
pub use ingest_config::IngestEnvConfig;
pub use observability_config::{LogFormat, ObservabilityEnvConfig};
pub use store_config::{DEFAULT_DATABASE_URL, StoreEnvConfig};

use anyhow::{Context, Result};

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub store: StoreEnvConfig,
    pub detector: DetectorEnvConfig,
    pub ingest: IngestEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables. Call `dotenvy::dotenv()`
    /// first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let store = StoreEnvConfig::from_env().context("Failed to load store config")?;
        let detector = DetectorEnvConfig::from_env().context("Failed to load detector config")?;
        let ingest = IngestEnvConfig::from_env();
        let observability = ObservabilityEnvConfig::from_env();

        Ok(Self {
            store,
            detector,
            ingest,
            observability,
        })
    }

    /// Same configuration with the storage URL replaced.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.store.database_url = url.into();
        self
    }
}
