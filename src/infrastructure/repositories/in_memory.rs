//! In-Memory History Backend
//!
//! Thread-safe, in-memory implementation of `HistoryBackend`.
//!
//! # Limitations
//!
//! - Data is lost on application restart
//! - Limited by available RAM
//!
//! Suitable for tests and for throwaway stores (`DATABASE_URL=memory://`).

use crate::domain::benchmark::Run;
use crate::domain::repositories::{HistoryBackend, StoredRun};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryHistoryBackend {
    runs: Arc<RwLock<Vec<StoredRun>>>,
}

impl InMemoryHistoryBackend {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryHistoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryBackend for InMemoryHistoryBackend {
    async fn append(&self, run: &Run) -> Result<i64> {
        let mut runs = self.runs.write().await;
        let seq = runs.len() as i64 + 1;
        runs.push(StoredRun {
            seq,
            run: run.clone(),
        });
        Ok(seq)
    }

    async fn load(&self) -> Result<Vec<StoredRun>> {
        Ok(self.runs.read().await.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
