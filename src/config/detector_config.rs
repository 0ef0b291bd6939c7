//! Regression detection configuration.
//!
//! Values come from environment variables first; an optional TOML policy file
//! (`BENCHTRAIL_POLICY_FILE`) then overrides whatever keys it sets:
//!
//! ```toml
//! [policy]
//! threshold_ratio = 1.15
//! use_range_overlap = true
//!
//! [detector]
//! baseline_window = 8
//! noisy_range_ratio = 0.05
//! noisy_action = "suppress"
//! ```

use crate::application::regression::{DetectorSettings, NoisySeriesAction};
use crate::domain::regression::ThresholdPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Detector environment configuration
#[derive(Debug, Clone, Default)]
pub struct DetectorEnvConfig {
    pub policy: ThresholdPolicy,
    pub settings: DetectorSettings,
    pub policy_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    #[serde(default)]
    policy: PolicyOverrides,
    #[serde(default)]
    detector: DetectorOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyOverrides {
    threshold_ratio: Option<f64>,
    threshold_absolute: Option<f64>,
    min_baseline_samples: Option<usize>,
    use_range_overlap: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DetectorOverrides {
    baseline_window: Option<usize>,
    include_non_distinct: Option<bool>,
    noisy_range_ratio: Option<f64>,
    noisy_action: Option<NoisySeriesAction>,
}

impl DetectorEnvConfig {
    pub fn from_env() -> Result<Self> {
        let threshold_absolute = match env::var("REGRESSION_THRESHOLD_ABSOLUTE") {
            Ok(v) if !v.trim().is_empty() => Some(
                v.trim()
                    .parse::<f64>()
                    .context("Failed to parse REGRESSION_THRESHOLD_ABSOLUTE")?,
            ),
            _ => None,
        };
        let noisy_range_ratio = match env::var("NOISY_RANGE_RATIO") {
            Ok(v) if !v.trim().is_empty() => Some(
                v.trim()
                    .parse::<f64>()
                    .context("Failed to parse NOISY_RANGE_RATIO")?,
            ),
            _ => None,
        };

        let policy = ThresholdPolicy {
            threshold_ratio: Self::parse_f64("REGRESSION_THRESHOLD_RATIO", 1.10)?,
            threshold_absolute,
            min_baseline_samples: Self::parse_usize("MIN_BASELINE_SAMPLES", 5)?,
            use_range_overlap: Self::parse_bool("USE_RANGE_OVERLAP", true),
        };

        let settings = DetectorSettings {
            baseline_window: Self::parse_usize("BASELINE_WINDOW", 10)?,
            include_non_distinct: Self::parse_bool("INCLUDE_NON_DISTINCT", false),
            noisy_range_ratio,
            noisy_action: NoisySeriesAction::from_str(
                &env::var("NOISY_SERIES_ACTION").unwrap_or_else(|_| "flag".to_string()),
            )?,
        };

        let mut config = Self {
            policy,
            settings,
            policy_file: None,
        };

        if let Ok(path) = env::var("BENCHTRAIL_POLICY_FILE")
            && !path.trim().is_empty()
        {
            config.apply_policy_file(Path::new(path.trim()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Overlay the keys set in a TOML policy file.
    pub fn apply_policy_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {:?}", path))?;
        self.apply_policy_toml(&content)
            .with_context(|| format!("Invalid policy file {:?}", path))?;
        self.policy_file = Some(path.to_path_buf());
        info!("Loaded detector policy from {:?}", path);
        Ok(())
    }

    pub fn apply_policy_toml(&mut self, content: &str) -> Result<()> {
        let file: PolicyFile = toml::from_str(content).context("Failed to parse policy TOML")?;

        let p = file.policy;
        if let Some(v) = p.threshold_ratio {
            self.policy.threshold_ratio = v;
        }
        if p.threshold_absolute.is_some() {
            self.policy.threshold_absolute = p.threshold_absolute;
        }
        if let Some(v) = p.min_baseline_samples {
            self.policy.min_baseline_samples = v;
        }
        if let Some(v) = p.use_range_overlap {
            self.policy.use_range_overlap = v;
        }

        let d = file.detector;
        if let Some(v) = d.baseline_window {
            self.settings.baseline_window = v;
        }
        if let Some(v) = d.include_non_distinct {
            self.settings.include_non_distinct = v;
        }
        if d.noisy_range_ratio.is_some() {
            self.settings.noisy_range_ratio = d.noisy_range_ratio;
        }
        if let Some(v) = d.noisy_action {
            self.settings.noisy_action = v;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.policy.threshold_ratio.is_finite() || self.policy.threshold_ratio < 1.0 {
            anyhow::bail!(
                "threshold_ratio must be a finite number >= 1.0, got {}",
                self.policy.threshold_ratio
            );
        }
        if let Some(abs) = self.policy.threshold_absolute
            && (!abs.is_finite() || abs < 0.0)
        {
            anyhow::bail!("threshold_absolute must be >= 0, got {}", abs);
        }
        if self.policy.min_baseline_samples == 0 {
            anyhow::bail!("min_baseline_samples must be at least 1");
        }
        if self.settings.baseline_window < self.policy.min_baseline_samples {
            anyhow::bail!(
                "baseline_window ({}) is smaller than min_baseline_samples ({}); every verdict would be insufficient_data",
                self.settings.baseline_window,
                self.policy.min_baseline_samples
            );
        }
        if let Some(r) = self.settings.noisy_range_ratio
            && (!r.is_finite() || r <= 0.0)
        {
            anyhow::bail!("noisy_range_ratio must be > 0, got {}", r);
        }
        Ok(())
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<bool>()
            .unwrap_or(default)
    }
}
