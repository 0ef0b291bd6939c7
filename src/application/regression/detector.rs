//! Regression detection against historical baselines.
//!
//! For every measurement of a freshly appended run the detector picks the
//! preceding window of the same series (by timestamp, skipping the run's own
//! commit and, unless configured otherwise, non-distinct pushes) and hands
//! it to the configured [`ComparisonPolicy`].

use crate::application::history_store::{HistoryStore, SeriesCursor};
use crate::domain::benchmark::{Measurement, Run, SeriesKey, TimeRange};
use crate::domain::regression::{
    AlertRecord, ComparisonPolicy, SeriesStats, ThresholdPolicy, Verdict,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to do with alerts for a series whose baseline is too noisy to trust.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoisySeriesAction {
    /// Publish, with `noisy = true` on the record.
    #[default]
    Flag,
    /// Keep the verdict but withhold regression/improvement alerts.
    Suppress,
}

impl FromStr for NoisySeriesAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flag" => Ok(NoisySeriesAction::Flag),
            "suppress" => Ok(NoisySeriesAction::Suppress),
            _ => anyhow::bail!(
                "Invalid NOISY_SERIES_ACTION: {}. Must be 'flag' or 'suppress'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Number of preceding measurements compared against.
    pub baseline_window: usize,
    pub include_non_distinct: bool,
    /// Baseline `median_delta / median` above which a series counts as noisy.
    pub noisy_range_ratio: Option<f64>,
    pub noisy_action: NoisySeriesAction,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            baseline_window: 10,
            include_non_distinct: false,
            noisy_range_ratio: None,
            noisy_action: NoisySeriesAction::Flag,
        }
    }
}

/// Verdict for one measurement of a run.
#[derive(Debug, Clone)]
pub struct Detection {
    pub verdict: Verdict,
    pub alert: AlertRecord,
    /// Alert withheld from sinks because the series is noisy.
    pub suppressed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    pub detections: Vec<Detection>,
}

impl DetectionReport {
    pub fn regressions(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(|d| d.verdict.is_regression())
    }

    pub fn has_regressions(&self) -> bool {
        self.regressions().next().is_some()
    }

    /// Records to hand to alert sinks: every verdict except suppressed ones.
    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.detections
            .iter()
            .filter(|d| !d.suppressed)
            .map(|d| d.alert.clone())
            .collect()
    }
}

pub struct RegressionDetector {
    settings: DetectorSettings,
    policy: Arc<dyn ComparisonPolicy>,
}

impl RegressionDetector {
    pub fn new(settings: DetectorSettings, policy: Arc<dyn ComparisonPolicy>) -> Self {
        Self { settings, policy }
    }

    pub fn with_threshold(settings: DetectorSettings, policy: ThresholdPolicy) -> Self {
        Self::new(settings, Arc::new(policy))
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn policy(&self) -> &Arc<dyn ComparisonPolicy> {
        &self.policy
    }

    /// Classify `candidate` against `baseline` (most recent first).
    ///
    /// Only the first `baseline_window` items of `baseline` are pulled.
    pub fn evaluate<I>(
        &self,
        key: &SeriesKey,
        candidate: &Measurement,
        baseline: I,
        policy: &dyn ComparisonPolicy,
    ) -> Verdict
    where
        I: IntoIterator<Item = Measurement>,
    {
        let window: Vec<Measurement> = baseline
            .into_iter()
            .take(self.settings.baseline_window)
            .collect();
        let verdict = policy.compare(candidate, &window);
        debug!(
            "{} [{}] {} vs {} baseline samples -> {}",
            key,
            policy.name(),
            candidate.value,
            window.len(),
            verdict.kind()
        );
        verdict
    }

    /// Measurements preceding `run` in `cursor`, most recent first.
    pub fn select_baseline<'a>(
        &'a self,
        cursor: SeriesCursor,
        run: &'a Run,
    ) -> impl Iterator<Item = Measurement> + 'a {
        cursor
            .rev()
            .filter(move |p| p.commit_id() != run.commit.id)
            .filter(move |p| self.settings.include_non_distinct || p.run.commit.distinct)
            .take(self.settings.baseline_window)
            .map(|p| p.measurement().clone())
    }

    fn is_noisy(&self, baseline: &[Measurement]) -> bool {
        let Some(limit) = self.settings.noisy_range_ratio else {
            return false;
        };
        SeriesStats::from_measurements(baseline)
            .and_then(|s| s.relative_range())
            .is_some_and(|r| r > limit)
    }

    /// Classify every measurement of `run` against the history in `store`.
    pub async fn evaluate_run(&self, store: &HistoryStore, run: &Run) -> DetectionReport {
        let mut report = DetectionReport::default();

        for candidate in &run.measurements {
            let key = SeriesKey::new(run.suite.clone(), candidate.name.clone());
            let cursor = store
                .query(&key, Some(TimeRange::until(run.timestamp)))
                .await;
            let baseline: Vec<Measurement> = self.select_baseline(cursor, run).collect();

            let noisy = self.is_noisy(&baseline);
            let verdict = self.evaluate(&key, candidate, baseline, self.policy.as_ref());
            let alert =
                AlertRecord::from_verdict(key, &run.commit.id, candidate.value, &verdict, noisy);
            let suppressed = noisy
                && self.settings.noisy_action == NoisySeriesAction::Suppress
                && alert.is_actionable();

            if verdict.is_regression() && !suppressed {
                warn!(
                    "Regression in {} at {}: {} -> {} (ratio {:.3})",
                    alert.key,
                    run.commit.short_id(),
                    alert.baseline_value.unwrap_or_default(),
                    alert.candidate_value,
                    alert.ratio.unwrap_or_default()
                );
            }

            report.detections.push(Detection {
                verdict,
                alert,
                suppressed,
            });
        }

        info!(
            "Evaluated {} measurements of {}: {} regressed",
            report.detections.len(),
            run.commit.short_id(),
            report.regressions().count()
        );
        report
    }
}
