use crate::domain::benchmark::SeriesKey;
use crate::domain::regression::verdict::{Verdict, VerdictKind};
use serde::{Deserialize, Serialize};

/// One detector outcome in the shape handed to notification collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub key: SeriesKey,
    pub verdict: VerdictKind,
    pub candidate_value: f64,
    pub baseline_value: Option<f64>,
    pub ratio: Option<f64>,
    pub commit_id: String,
    /// Baseline noise band exceeded the configured relative range.
    #[serde(default)]
    pub noisy: bool,
}

impl AlertRecord {
    pub fn from_verdict(
        key: SeriesKey,
        commit_id: impl Into<String>,
        candidate_value: f64,
        verdict: &Verdict,
        noisy: bool,
    ) -> Self {
        let comparison = verdict.comparison();
        Self {
            key,
            verdict: verdict.kind(),
            candidate_value,
            baseline_value: comparison.map(|c| c.baseline_value),
            ratio: comparison.map(|c| c.ratio),
            commit_id: commit_id.into(),
            noisy,
        }
    }

    /// Regressions and improvements are worth telling someone about.
    pub fn is_actionable(&self) -> bool {
        matches!(self.verdict, VerdictKind::Regressed | VerdictKind::Improved)
    }
}
