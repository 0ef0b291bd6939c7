//! Storage configuration parsing from environment variables.

use crate::application::history_store::DuplicatePolicy;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://benchtrail.db";

/// Storage environment configuration
#[derive(Debug, Clone)]
pub struct StoreEnvConfig {
    /// `sqlite://<path>`, `jsonl://<path>` or `memory://`
    pub database_url: String,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for StoreEnvConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            duplicate_policy: DuplicatePolicy::Reject,
        }
    }
}

impl StoreEnvConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let duplicate_policy = DuplicatePolicy::from_str(
            &env::var("DUPLICATE_POLICY").unwrap_or_else(|_| "reject".to_string()),
        )
        .context("Failed to parse DUPLICATE_POLICY")?;

        Ok(Self {
            database_url,
            duplicate_policy,
        })
    }
}
