//! Read-only projections of the history store for dashboards and alerting.

use crate::application::history_store::{HistoryStore, SeriesCursor, SeriesPoint};
use crate::domain::benchmark::{SeriesKey, TimeRange};
use crate::domain::regression::SeriesStats;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteSummary {
    pub suite: String,
    pub series: usize,
}

/// One plotted point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timestamp: DateTime<Utc>,
    pub commit_id: String,
    pub commit_url: String,
    pub value: f64,
    pub range_low: f64,
    pub range_high: f64,
}

impl From<&SeriesPoint> for ChartPoint {
    fn from(point: &SeriesPoint) -> Self {
        let m = point.measurement();
        Self {
            timestamp: point.timestamp(),
            commit_id: point.commit_id().to_string(),
            commit_url: point.run.commit.url.clone(),
            value: m.value,
            range_low: m.range_low(),
            range_high: m.range_high(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLine {
    /// `None` for names that do not follow `"<Group>/<Variant>"`.
    pub variant: Option<String>,
    pub name: String,
    pub unit: String,
    pub points: Vec<ChartPoint>,
}

/// Series sharing the `<Group>` part of their names, drawn on one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartGroup {
    pub group: String,
    pub lines: Vec<ChartLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub key: SeriesKey,
    pub unit: String,
    pub points: Vec<ChartPoint>,
    pub stats: Option<SeriesStats>,
}

impl Trend {
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        self.stats.as_ref()?.coefficient_of_variation()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestEntry {
    pub name: String,
    pub unit: String,
    pub value: f64,
    pub delta: f64,
    pub commit_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Side-effect free facade over [`HistoryStore`].
#[derive(Clone)]
pub struct QueryApi {
    store: Arc<HistoryStore>,
}

impl QueryApi {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }

    pub async fn suites(&self) -> Vec<SuiteSummary> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for key in self.store.keys().await {
            *counts.entry(key.suite).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(suite, series)| SuiteSummary { suite, series })
            .collect()
    }

    /// Every series of `suite`, grouped for charting. Groups and lines are
    /// sorted by name; points by timestamp.
    pub async fn suite_chart(&self, suite: &str, range: Option<TimeRange>) -> Vec<ChartGroup> {
        let mut groups: BTreeMap<String, Vec<ChartLine>> = BTreeMap::new();

        for key in self.store.keys().await.into_iter().filter(|k| k.suite == suite) {
            let cursor = self.store.query(&key, range).await;
            let unit = cursor.unit().unwrap_or_default().to_string();
            let points: Vec<ChartPoint> = cursor.map(|p| ChartPoint::from(&p)).collect();
            if points.is_empty() {
                continue;
            }
            let (group, variant) = key.group_and_variant();
            groups.entry(group.to_string()).or_default().push(ChartLine {
                variant: variant.map(str::to_string),
                name: key.name.clone(),
                unit,
                points,
            });
        }

        groups
            .into_iter()
            .map(|(group, lines)| ChartGroup { group, lines })
            .collect()
    }

    /// Last `last_n` points of `key` with summary statistics over them.
    pub async fn trend(&self, key: &SeriesKey, last_n: usize) -> Trend {
        let cursor = self.store.last_n(key, last_n).await;
        let unit = cursor.unit().unwrap_or_default().to_string();
        let points: Vec<SeriesPoint> = cursor.collect();
        let measurements: Vec<_> = points.iter().map(|p| p.measurement().clone()).collect();

        Trend {
            key: key.clone(),
            unit,
            stats: SeriesStats::from_measurements(&measurements),
            points: points.iter().map(ChartPoint::from).collect(),
        }
    }

    /// Latest point of every series in `suite`, sorted by name.
    pub async fn latest_run_summary(&self, suite: &str) -> Vec<LatestEntry> {
        let mut entries = Vec::new();
        for key in self.store.keys().await.into_iter().filter(|k| k.suite == suite) {
            if let Some(point) = self.store.latest(&key).await {
                let m = point.measurement();
                entries.push(LatestEntry {
                    name: key.name.clone(),
                    unit: m.unit.clone(),
                    value: m.value,
                    delta: m.delta,
                    commit_id: point.commit_id().to_string(),
                    timestamp: point.timestamp(),
                });
            }
        }
        entries
    }

    /// Write `key` within `range` as CSV, one row per point.
    pub async fn write_csv<W: Write>(
        &self,
        key: &SeriesKey,
        range: Option<TimeRange>,
        writer: W,
    ) -> Result<usize> {
        write_cursor_csv(self.store.query(key, range).await, writer)
    }
}

/// Write every point of `cursor` as CSV, header first.
pub fn write_cursor_csv<W: Write>(cursor: SeriesCursor, writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "timestamp",
        "commit",
        "name",
        "value",
        "range_low",
        "range_high",
        "unit",
    ])
    .context("Failed to write CSV header")?;

    let mut rows = 0;
    for point in cursor {
        let m = point.measurement();
        wtr.write_record([
            point.timestamp().to_rfc3339(),
            point.commit_id().to_string(),
            m.name.clone(),
            m.value.to_string(),
            m.range_low().to_string(),
            m.range_high().to_string(),
            m.unit.clone(),
        ])
        .with_context(|| format!("Failed to write CSV row for {}", m.name))?;
        rows += 1;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(rows)
}
