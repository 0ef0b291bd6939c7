use serde::{Deserialize, Serialize};

/// Direction in which a metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// Durations, memory: smaller is better.
    LowerIsBetter,
    /// Throughput: larger is better.
    HigherIsBetter,
}

impl Polarity {
    /// Infer polarity from a unit string. Rates (`ops/s`, `MB/s`, ...) are
    /// higher-is-better, everything else is treated as a cost.
    pub fn for_unit(unit: &str) -> Self {
        let unit = unit.trim().to_lowercase();
        if unit.ends_with("/s") || unit.ends_with("/sec") || unit.contains("ops") {
            Polarity::HigherIsBetter
        } else {
            Polarity::LowerIsBetter
        }
    }
}

/// One named timing observation: nominal value with a symmetric ± delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
    /// Half-width of the uncertainty band (`range = ± delta`).
    pub delta: f64,
    pub unit: String,
}

impl Measurement {
    pub fn new(name: impl Into<String>, value: f64, delta: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            delta,
            unit: unit.into(),
        }
    }

    pub fn range_low(&self) -> f64 {
        self.value - self.delta
    }

    pub fn range_high(&self) -> f64 {
        self.value + self.delta
    }

    /// Relative width of the band, `delta / value`. `None` when the value is zero.
    pub fn relative_range(&self) -> Option<f64> {
        if self.value.abs() > f64::EPSILON {
            Some(self.delta.abs() / self.value.abs())
        } else {
            None
        }
    }

    pub fn polarity(&self) -> Polarity {
        Polarity::for_unit(&self.unit)
    }

    /// `"± 253"` as written in the benchmark data file.
    pub fn formatted_range(&self) -> String {
        format!("± {}", format_number(self.delta))
    }
}

/// Render integral values without a trailing `.0`, mirroring the data file.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
