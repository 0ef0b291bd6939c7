//! Storage port for benchmark history.
//!
//! The [`HistoryBackend`] is the durable half of the history store: it keeps
//! an append-only log of runs and replays it on startup. Indexing and query
//! logic live above it in `application::history_store`, so backends only
//! need to be good at two things: durable append and ordered replay.
//!
//! # Implementations
//!
//! - `SqliteHistoryRepository`: `runs` + `measurements` tables (default)
//! - `JsonlHistoryLog`: one JSON line per run, fsync'd on append
//! - `InMemoryHistoryBackend`: for tests and throwaway stores

use crate::domain::benchmark::Run;
use anyhow::Result;
use async_trait::async_trait;

/// A run as recorded in the append log, tagged with its log sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRun {
    pub seq: i64,
    pub run: Run,
}

/// Durable append-only log of runs.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Persist a run atomically. The run must be durable when this returns `Ok`.
    /// Returns the sequence number assigned to the run.
    async fn append(&self, run: &Run) -> Result<i64>;

    /// Replay every stored run in append order.
    async fn load(&self) -> Result<Vec<StoredRun>>;

    /// Short backend name for logs.
    fn describe(&self) -> String;
}
