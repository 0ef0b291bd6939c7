//! Comparison policies.
//!
//! A policy turns a candidate measurement and its baseline window into a
//! [`Verdict`]. The store and detector never look at the numbers themselves,
//! so a statistical test can replace [`ThresholdPolicy`] without touching them.

use crate::domain::benchmark::{Measurement, Polarity};
use crate::domain::regression::stats::SeriesStats;
use crate::domain::regression::verdict::{Comparison, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub trait ComparisonPolicy: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Classify `candidate` against `baseline` (most recent first).
    /// Must not panic on any input; too little data yields `InsufficientData`.
    fn compare(&self, candidate: &Measurement, baseline: &[Measurement]) -> Verdict;
}

/// Ratio threshold on the nominal value, optionally gated on ± band overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdPolicy {
    /// `1.10` = 10% worse than baseline counts as a regression.
    pub threshold_ratio: f64,
    /// Minimum absolute change (in the series unit) for a non-stable verdict.
    pub threshold_absolute: Option<f64>,
    pub min_baseline_samples: usize,
    /// Require the candidate's band to clear the baseline's band entirely.
    pub use_range_overlap: bool,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            threshold_ratio: 1.10,
            threshold_absolute: None,
            min_baseline_samples: 5,
            use_range_overlap: true,
        }
    }
}

impl ThresholdPolicy {
    fn bands_separate_worse(
        candidate: &Measurement,
        stats: &SeriesStats,
        polarity: Polarity,
    ) -> bool {
        match polarity {
            Polarity::LowerIsBetter => candidate.range_low() > stats.band_high(),
            Polarity::HigherIsBetter => candidate.range_high() < stats.band_low(),
        }
    }

    fn bands_separate_better(
        candidate: &Measurement,
        stats: &SeriesStats,
        polarity: Polarity,
    ) -> bool {
        match polarity {
            Polarity::LowerIsBetter => candidate.range_high() < stats.band_low(),
            Polarity::HigherIsBetter => candidate.range_low() > stats.band_high(),
        }
    }
}

impl ComparisonPolicy for ThresholdPolicy {
    fn name(&self) -> &str {
        "threshold"
    }

    fn compare(&self, candidate: &Measurement, baseline: &[Measurement]) -> Verdict {
        let required = self.min_baseline_samples.max(1);
        let stats = match SeriesStats::from_measurements(baseline) {
            Some(stats) if stats.samples >= required => stats,
            Some(stats) => {
                return Verdict::InsufficientData {
                    available: stats.samples,
                    required,
                };
            }
            None => {
                return Verdict::InsufficientData {
                    available: 0,
                    required,
                };
            }
        };

        // A ratio against a zero or negative baseline carries no meaning.
        if !candidate.value.is_finite() || stats.median <= 0.0 {
            return Verdict::InsufficientData {
                available: stats.samples,
                required,
            };
        }

        let ratio = candidate.value / stats.median;
        let comparison = Comparison {
            candidate_value: candidate.value,
            baseline_value: stats.median,
            ratio,
            change: candidate.value - stats.median,
            baseline_samples: stats.samples,
        };

        let polarity = candidate.polarity();
        let worse_ratio = match polarity {
            Polarity::LowerIsBetter => ratio,
            Polarity::HigherIsBetter if ratio > 0.0 => 1.0 / ratio,
            Polarity::HigherIsBetter => f64::INFINITY,
        };
        let threshold = self.threshold_ratio.max(1.0);
        let large_enough = self
            .threshold_absolute
            .is_none_or(|min| comparison.change.abs() >= min);

        let mut worse = worse_ratio >= threshold && large_enough;
        let mut better = worse_ratio <= 1.0 / threshold && large_enough;
        if self.use_range_overlap {
            worse = worse && Self::bands_separate_worse(candidate, &stats, polarity);
            better = better && Self::bands_separate_better(candidate, &stats, polarity);
        }

        if worse {
            Verdict::Regressed(comparison)
        } else if better {
            Verdict::Improved(comparison)
        } else {
            Verdict::Stable(comparison)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::regression::verdict::VerdictKind;

    fn baseline() -> Vec<Measurement> {
        [100.0, 102.0, 99.0, 101.0, 100.0]
            .iter()
            .map(|v| Measurement::new("bench", *v, 5.0, "ns/iter"))
            .collect()
    }

    #[test]
    fn test_clear_regression() {
        let policy = ThresholdPolicy::default();
        let verdict = policy.compare(&Measurement::new("bench", 150.0, 3.0, "ns/iter"), &baseline());

        match verdict {
            Verdict::Regressed(c) => {
                assert!((c.ratio - 1.5).abs() < 0.01);
                assert_eq!(c.baseline_value, 100.0);
                assert_eq!(c.change, 50.0);
            }
            other => panic!("expected regression, got {:?}", other),
        }
    }

    #[test]
    fn test_overlapping_bands_are_stable() {
        let candidate = Measurement::new("bench", 115.0, 12.0, "ns/iter");

        let gated = ThresholdPolicy::default();
        assert_eq!(gated.compare(&candidate, &baseline()).kind(), VerdictKind::Stable);

        let naive = ThresholdPolicy {
            use_range_overlap: false,
            ..ThresholdPolicy::default()
        };
        assert_eq!(naive.compare(&candidate, &baseline()).kind(), VerdictKind::Regressed);
    }

    #[test]
    fn test_improvement() {
        let policy = ThresholdPolicy::default();
        let verdict = policy.compare(&Measurement::new("bench", 70.0, 2.0, "ns/iter"), &baseline());
        assert_eq!(verdict.kind(), VerdictKind::Improved);
    }

    #[test]
    fn test_throughput_drop_is_regression() {
        let window: Vec<Measurement> = [1000.0, 1010.0, 990.0, 1000.0, 1005.0]
            .iter()
            .map(|v| Measurement::new("throughput", *v, 10.0, "ops/s"))
            .collect();
        let policy = ThresholdPolicy::default();
        let verdict = policy.compare(&Measurement::new("throughput", 700.0, 10.0, "ops/s"), &window);
        assert_eq!(verdict.kind(), VerdictKind::Regressed);
    }

    #[test]
    fn test_absolute_threshold_filters_small_changes() {
        let window: Vec<Measurement> = [10.0, 10.0, 10.0, 10.0, 10.0]
            .iter()
            .map(|v| Measurement::new("tiny", *v, 0.0, "ns/iter"))
            .collect();
        let policy = ThresholdPolicy {
            threshold_absolute: Some(5.0),
            ..ThresholdPolicy::default()
        };
        let verdict = policy.compare(&Measurement::new("tiny", 13.0, 0.0, "ns/iter"), &window);
        assert_eq!(verdict.kind(), VerdictKind::Stable);
    }

    #[test]
    fn test_insufficient_baseline() {
        let policy = ThresholdPolicy::default();
        let verdict = policy.compare(&Measurement::new("bench", 500.0, 1.0, "ns/iter"), &baseline()[..1]);
        assert_eq!(
            verdict,
            Verdict::InsufficientData {
                available: 1,
                required: 5
            }
        );

        let empty = policy.compare(&Measurement::new("bench", 500.0, 1.0, "ns/iter"), &[]);
        assert_eq!(empty.kind(), VerdictKind::InsufficientData);
    }

    #[test]
    fn test_zero_baseline_does_not_divide() {
        let window: Vec<Measurement> = (0..5)
            .map(|_| Measurement::new("zero", 0.0, 0.0, "ns/iter"))
            .collect();
        let policy = ThresholdPolicy::default();
        let verdict = policy.compare(&Measurement::new("zero", 1.0, 0.0, "ns/iter"), &window);
        assert_eq!(verdict.kind(), VerdictKind::InsufficientData);
    }
}
