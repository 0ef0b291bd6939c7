use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::StoreEnvConfig;
use crate::domain::repositories::HistoryBackend;
use crate::infrastructure::persistence::{Database, JsonlHistoryLog, SqliteHistoryRepository};
use crate::infrastructure::repositories::InMemoryHistoryBackend;

/// Storage selected by the scheme of `DATABASE_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendLocation {
    Sqlite(String),
    Jsonl(String),
    Memory,
}

impl BackendLocation {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.starts_with("sqlite:") {
            Ok(BackendLocation::Sqlite(url.to_string()))
        } else if let Some(path) = url.strip_prefix("jsonl://") {
            if path.is_empty() {
                anyhow::bail!("jsonl:// URL needs a file path");
            }
            Ok(BackendLocation::Jsonl(path.to_string()))
        } else if url == "memory://" || url == "memory" {
            Ok(BackendLocation::Memory)
        } else {
            anyhow::bail!(
                "Unsupported DATABASE_URL: {}. Expected sqlite://, jsonl:// or memory://",
                url
            )
        }
    }
}

pub struct PersistenceBootstrap;

impl PersistenceBootstrap {
    pub async fn init(config: &StoreEnvConfig) -> Result<Arc<dyn HistoryBackend>> {
        let location = BackendLocation::parse(&config.database_url)?;
        info!("Initializing history backend at {}", config.database_url);

        let backend: Arc<dyn HistoryBackend> = match location {
            BackendLocation::Sqlite(url) => {
                let db = Database::new(&url)
                    .await
                    .context("Failed to initialize database")?;
                Arc::new(SqliteHistoryRepository::new(db.pool.clone()))
            }
            BackendLocation::Jsonl(path) => Arc::new(
                JsonlHistoryLog::open(&path)
                    .await
                    .context("Failed to open history log")?,
            ),
            BackendLocation::Memory => Arc::new(InMemoryHistoryBackend::new()),
        };
        Ok(backend)
    }
}
