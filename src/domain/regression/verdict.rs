use serde::{Deserialize, Serialize};
use std::fmt;

/// Candidate-versus-baseline numbers behind a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub candidate_value: f64,
    /// Baseline point estimate (median of the window).
    pub baseline_value: f64,
    /// `candidate_value / baseline_value`.
    pub ratio: f64,
    /// `candidate_value - baseline_value`.
    pub change: f64,
    pub baseline_samples: usize,
}

/// Outcome of comparing a candidate measurement with its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Improved(Comparison),
    Stable(Comparison),
    Regressed(Comparison),
    InsufficientData { available: usize, required: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Improved,
    Stable,
    Regressed,
    InsufficientData,
}

impl Verdict {
    pub fn kind(&self) -> VerdictKind {
        match self {
            Verdict::Improved(_) => VerdictKind::Improved,
            Verdict::Stable(_) => VerdictKind::Stable,
            Verdict::Regressed(_) => VerdictKind::Regressed,
            Verdict::InsufficientData { .. } => VerdictKind::InsufficientData,
        }
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        match self {
            Verdict::Improved(c) | Verdict::Stable(c) | Verdict::Regressed(c) => Some(c),
            Verdict::InsufficientData { .. } => None,
        }
    }

    pub fn is_regression(&self) -> bool {
        matches!(self, Verdict::Regressed(_))
    }
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::Improved => "improved",
            VerdictKind::Stable => "stable",
            VerdictKind::Regressed => "regressed",
            VerdictKind::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
