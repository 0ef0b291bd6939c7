//! The `data.js` file read by the benchmark chart front end:
//!
//! ```text
//! window.BENCHMARK_DATA = {
//!   "lastUpdate": 1653449213312,
//!   "repoUrl": "https://github.com/owner/repo",
//!   "entries": { "Benchmark": [ { "commit": {...}, "date": ..., "tool": "cargo", "benches": [...] } ] }
//! }
//! ```
//!
//! Entries are kept as raw JSON on import so every run goes through the
//! same validation as a CI payload.

use crate::application::history_store::HistoryStore;
use crate::application::ingest::RawRun;
use crate::domain::benchmark::Run;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const JS_PREFIX: &str = "window.BENCHMARK_DATA";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkDataFile<E = Value> {
    pub last_update: i64,
    pub repo_url: String,
    pub entries: BTreeMap<String, Vec<E>>,
}

impl<E> BenchmarkDataFile<E> {
    pub fn run_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Accept either bare JSON or the `window.BENCHMARK_DATA = {...}` assignment.
pub fn parse_benchmark_data(text: &str) -> Result<BenchmarkDataFile> {
    let mut body = text.trim().trim_start_matches('\u{feff}').trim();
    if let Some(rest) = body.strip_prefix(JS_PREFIX) {
        body = rest
            .trim_start()
            .strip_prefix('=')
            .context("Expected '=' after window.BENCHMARK_DATA")?
            .trim();
    }
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();

    serde_json::from_str(body).context("Failed to parse benchmark data JSON")
}

pub fn read_benchmark_data(path: &Path) -> Result<BenchmarkDataFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read benchmark data {:?}", path))?;
    parse_benchmark_data(&text)
}

/// Snapshot of every suite in `store`, runs ordered by timestamp.
///
/// Only points still live in the index are emitted, so a run whose
/// measurements were partly superseded by an upsert keeps the rest.
pub async fn collect_benchmark_data(
    store: &HistoryStore,
    repo_url: &str,
) -> BenchmarkDataFile<RawRun> {
    // suite -> seq -> (run, live measurement positions)
    let mut suites: BTreeMap<String, HashMap<i64, (Arc<Run>, BTreeSet<usize>)>> = BTreeMap::new();

    for key in store.keys().await {
        for point in store.query(&key, None).await {
            suites
                .entry(key.suite.clone())
                .or_default()
                .entry(point.seq)
                .or_insert_with(|| (point.run.clone(), BTreeSet::new()))
                .1
                .insert(point.position());
        }
    }

    let entries = suites
        .into_iter()
        .map(|(suite, runs)| {
            let mut runs: Vec<_> = runs.into_iter().collect();
            runs.sort_by_key(|(seq, (run, _))| (run.timestamp, *seq));
            let raw = runs
                .into_iter()
                .map(|(_, (run, positions))| {
                    RawRun::from_run(&run, positions.iter().map(|&i| &run.measurements[i]))
                })
                .collect();
            (suite, raw)
        })
        .collect();

    BenchmarkDataFile {
        last_update: Utc::now().timestamp_millis(),
        repo_url: repo_url.to_string(),
        entries,
    }
}

/// Render in the JavaScript assignment form the chart page loads.
pub fn render_benchmark_data(data: &BenchmarkDataFile<RawRun>) -> Result<String> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize benchmark data")?;
    Ok(format!("{} = {}\n", JS_PREFIX, json))
}

/// Write the data file atomically (temp file, then rename).
pub async fn export_benchmark_data(store: &HistoryStore, repo_url: &str, path: &Path) -> Result<usize> {
    let data = collect_benchmark_data(store, repo_url).await;
    let content = render_benchmark_data(&data)?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).context("Failed to write temp benchmark data file")?;
    fs::rename(&temp_path, path).context("Failed to rename benchmark data file")?;

    info!("Exported {} runs to {:?}", data.run_count(), path);
    Ok(data.run_count())
}
