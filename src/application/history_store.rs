//! Append-only benchmark history with a per-series timestamp index.
//!
//! Runs are persisted through a [`HistoryBackend`] and indexed in memory as
//! one sorted [`TimeSeries`] per [`SeriesKey`]. Each series sits behind an
//! `Arc` and is updated copy-on-write: an append edits the series in place
//! unless a reader still holds a cursor over it, in which case that reader
//! keeps the old version and the index gets a copy.
//!
//! # Concurrency
//!
//! - Appends are serialized by a single write lock (write volume is one run
//!   per CI build).
//! - Reads take the index lock only long enough to clone an `Arc`.

use crate::domain::benchmark::{Measurement, Run, SeriesKey, TimeRange};
use crate::domain::errors::StoreError;
use crate::domain::repositories::HistoryBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// What to do when a run re-reports a commit already present in a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Refuse the whole run with `DuplicateCommit`.
    #[default]
    Reject,
    /// Replace the stored point; the series length is unchanged.
    Upsert,
}

impl FromStr for DuplicatePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(DuplicatePolicy::Reject),
            "upsert" => Ok(DuplicatePolicy::Upsert),
            _ => anyhow::bail!(
                "Invalid DUPLICATE_POLICY: {}. Must be 'reject' or 'upsert'",
                s
            ),
        }
    }
}

/// One `(Run, Measurement)` pair of a series.
#[derive(Debug, Clone)]
pub struct SeriesPoint {
    pub run: Arc<Run>,
    /// Log sequence number of the run.
    pub seq: i64,
    index: usize,
}

impl SeriesPoint {
    pub fn measurement(&self) -> &Measurement {
        &self.run.measurements[self.index]
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.run.timestamp
    }

    pub fn commit_id(&self) -> &str {
        &self.run.commit.id
    }

    /// Position of this point's measurement within its run.
    pub fn position(&self) -> usize {
        self.index
    }
}

/// Immutable, timestamp-ordered version of one series.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub key: SeriesKey,
    pub unit: String,
    points: Vec<SeriesPoint>,
    commits: HashSet<String>,
}

impl TimeSeries {
    fn new(key: SeriesKey, unit: String) -> Self {
        Self {
            key,
            unit,
            points: Vec::new(),
            commits: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contains_commit(&self, commit_id: &str) -> bool {
        self.commits.contains(commit_id)
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Half-open index window `[start, end)` covering `range`.
    fn bounds(&self, range: &TimeRange) -> (usize, usize) {
        if range.is_empty() {
            return (0, 0);
        }
        let start = match range.since {
            Some(since) => self.points.partition_point(|p| p.timestamp() < since),
            None => 0,
        };
        let end = match range.until {
            Some(until) => self.points.partition_point(|p| p.timestamp() <= until),
            None => self.points.len(),
        };
        (start, end.max(start))
    }

    /// Insert `point` in timestamp order; equal timestamps keep arrival
    /// order. In-order arrivals land at the end without shifting.
    fn insert(&mut self, point: SeriesPoint, replace: bool) {
        let commit_id = point.commit_id().to_string();
        if replace {
            self.points.retain(|p| p.commit_id() != commit_id);
        }
        let ts = point.timestamp();
        let at = self.points.partition_point(|p| p.timestamp() <= ts);
        self.points.insert(at, point);
        self.commits.insert(commit_id);
    }
}

/// Lazy, restartable view over a slice of one series.
///
/// Cloning a cursor restarts it from the same window; iteration never
/// touches the store lock.
#[derive(Debug, Clone)]
pub struct SeriesCursor {
    series: Option<Arc<TimeSeries>>,
    front: usize,
    back: usize,
}

impl SeriesCursor {
    fn empty() -> Self {
        Self {
            series: None,
            front: 0,
            back: 0,
        }
    }

    fn over(series: Arc<TimeSeries>, range: Option<&TimeRange>) -> Self {
        let (front, back) = match range {
            Some(range) => series.bounds(range),
            None => (0, series.len()),
        };
        Self {
            series: Some(series),
            front,
            back,
        }
    }

    /// Keep only the last `n` points of the window.
    pub fn tail(mut self, n: usize) -> Self {
        self.front = self.front.max(self.back.saturating_sub(n));
        self
    }

    pub fn unit(&self) -> Option<&str> {
        self.series.as_deref().map(|s| s.unit.as_str())
    }
}

impl Iterator for SeriesCursor {
    type Item = SeriesPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let point = self.series.as_ref()?.points.get(self.front).cloned();
        self.front += 1;
        point
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back.saturating_sub(self.front);
        (n, Some(n))
    }
}

impl DoubleEndedIterator for SeriesCursor {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.series.as_ref()?.points.get(self.back).cloned()
    }
}

impl ExactSizeIterator for SeriesCursor {}

/// Result of a successful append.
#[derive(Debug, Clone)]
pub struct AppendReceipt {
    pub seq: i64,
    pub run: Arc<Run>,
    pub series_touched: usize,
    /// Keys whose existing point for this commit was replaced.
    pub replaced: Vec<SeriesKey>,
}

#[derive(Default)]
struct HistoryIndex {
    series: HashMap<SeriesKey, Arc<TimeSeries>>,
    runs: usize,
}

/// A validated append waiting for its sequence number.
struct StagedAppend {
    run: Arc<Run>,
    plan: Vec<PlannedPoint>,
}

struct PlannedPoint {
    key: SeriesKey,
    index: usize,
    replace: bool,
}

impl StagedAppend {
    fn replaced(&self) -> Vec<SeriesKey> {
        self.plan
            .iter()
            .filter(|p| p.replace)
            .map(|p| p.key.clone())
            .collect()
    }
}

impl HistoryIndex {
    /// Check `run` against the current series without mutating anything.
    /// Any error leaves the index as it was.
    fn stage(&self, run: Run, policy: DuplicatePolicy) -> Result<StagedAppend, StoreError> {
        if run.commit.id.trim().is_empty() {
            return Err(StoreError::InvalidRun {
                reason: "commit id is empty".to_string(),
            });
        }
        if run.measurements.is_empty() {
            return Err(StoreError::InvalidRun {
                reason: "run carries no measurements".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for m in &run.measurements {
            if !seen.insert(m.name.as_str()) {
                return Err(StoreError::InvalidRun {
                    reason: format!("measurement '{}' reported twice", m.name),
                });
            }
        }

        let mut plan = Vec::with_capacity(run.measurements.len());
        for (index, m) in run.measurements.iter().enumerate() {
            let key = SeriesKey::new(run.suite.clone(), m.name.clone());
            let mut replace = false;

            if let Some(series) = self.series.get(&key) {
                if series.unit != m.unit {
                    return Err(StoreError::UnitMismatch {
                        key,
                        expected: series.unit.clone(),
                        actual: m.unit.clone(),
                    });
                }
                if series.contains_commit(&run.commit.id) {
                    match policy {
                        DuplicatePolicy::Reject => {
                            return Err(StoreError::DuplicateCommit {
                                key,
                                commit_id: run.commit.id.clone(),
                            });
                        }
                        DuplicatePolicy::Upsert => replace = true,
                    }
                }
            }

            plan.push(PlannedPoint {
                key,
                index,
                replace,
            });
        }

        Ok(StagedAppend {
            run: Arc::new(run),
            plan,
        })
    }

    /// Add the staged run to every series it touches. A series still
    /// shared with a reader is copied first; otherwise it is edited in place.
    fn install(&mut self, staged: &StagedAppend, seq: i64) {
        for planned in &staged.plan {
            let point = SeriesPoint {
                run: staged.run.clone(),
                seq,
                index: planned.index,
            };
            let series = self.series.entry(planned.key.clone()).or_insert_with(|| {
                let unit = point.measurement().unit.clone();
                Arc::new(TimeSeries::new(planned.key.clone(), unit))
            });
            Arc::make_mut(series).insert(point, planned.replace);
        }
        self.runs += 1;
    }
}

/// Durable, queryable accumulation of benchmark runs.
pub struct HistoryStore {
    backend: Arc<dyn HistoryBackend>,
    duplicate_policy: DuplicatePolicy,
    index: RwLock<HistoryIndex>,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    /// Open a store over `backend`, rebuilding the index from its log.
    ///
    /// Later log entries for the same commit supersede earlier ones, which is
    /// how upserts are represented durably.
    pub async fn open(
        backend: Arc<dyn HistoryBackend>,
        duplicate_policy: DuplicatePolicy,
    ) -> Result<Self, StoreError> {
        let stored = backend.load().await?;
        let mut index = HistoryIndex::default();

        for entry in stored {
            let seq = entry.seq;
            let staged = index
                .stage(entry.run, DuplicatePolicy::Upsert)
                .map_err(|e| {
                    StoreError::Storage(anyhow::anyhow!(
                        "history log entry {} cannot be replayed: {}",
                        seq,
                        e
                    ))
                })?;
            index.install(&staged, seq);
        }

        info!(
            "History store opened on {}: {} runs, {} series",
            backend.describe(),
            index.runs,
            index.series.len()
        );

        Ok(Self {
            backend,
            duplicate_policy,
            index: RwLock::new(index),
            write_lock: Mutex::new(()),
        })
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    /// Append `run` under the store's duplicate policy.
    pub async fn append(&self, run: Run) -> Result<AppendReceipt, StoreError> {
        self.append_with_policy(run, self.duplicate_policy).await
    }

    /// Append `run`, all-or-nothing. The run is durable in the backend before
    /// the index changes; on any error neither has changed.
    pub async fn append_with_policy(
        &self,
        run: Run,
        policy: DuplicatePolicy,
    ) -> Result<AppendReceipt, StoreError> {
        let _writer = self.write_lock.lock().await;

        let staged = {
            let index = self.index.read().await;
            index.stage(run, policy)
        };
        let staged = match staged {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Rejected run: {}", e);
                return Err(e);
            }
        };

        let seq = self.backend.append(&staged.run).await?;
        self.index.write().await.install(&staged, seq);

        let replaced = staged.replaced();
        info!(
            "Appended run {} ({}, seq {}): {} series, {} replaced",
            staged.run.commit.short_id(),
            staged.run.suite,
            seq,
            staged.plan.len(),
            replaced.len()
        );

        Ok(AppendReceipt {
            seq,
            series_touched: staged.plan.len(),
            run: staged.run,
            replaced,
        })
    }

    /// Points of `key` within `range` (whole series when `None`), ordered by
    /// timestamp ascending. Unknown keys yield an empty cursor.
    pub async fn query(&self, key: &SeriesKey, range: Option<TimeRange>) -> SeriesCursor {
        match self.series(key).await {
            Some(series) => {
                let cursor = SeriesCursor::over(series, range.as_ref());
                debug!("Query {} -> {} points", key, cursor.len());
                cursor
            }
            None => SeriesCursor::empty(),
        }
    }

    /// Last `n` points of `key`, oldest first.
    pub async fn last_n(&self, key: &SeriesKey, n: usize) -> SeriesCursor {
        self.query(key, None).await.tail(n)
    }

    pub async fn latest(&self, key: &SeriesKey) -> Option<SeriesPoint> {
        self.series(key).await?.latest().cloned()
    }

    pub async fn series(&self, key: &SeriesKey) -> Option<Arc<TimeSeries>> {
        self.index.read().await.series.get(key).cloned()
    }

    /// All keys, sorted by suite then name.
    pub async fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.index.read().await.series.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn series_count(&self) -> usize {
        self.index.read().await.series.len()
    }

    /// Runs appended, counting upserts.
    pub async fn run_count(&self) -> usize {
        self.index.read().await.runs
    }
}
