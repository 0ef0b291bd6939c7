use crate::domain::benchmark::Measurement;
use serde::Serialize;
use statrs::statistics::{Data, Distribution, Max, Median, Min};

/// Summary statistics over a window of measurements of one series.
///
/// Non-finite values are dropped before anything is computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub samples: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Median of the ± deltas; the typical half-width of the noise band.
    pub median_delta: f64,
    /// Sample standard deviation of the values (0 for a single sample).
    pub std_dev: f64,
}

impl SeriesStats {
    pub fn from_measurements(measurements: &[Measurement]) -> Option<Self> {
        let values: Vec<f64> = measurements
            .iter()
            .map(|m| m.value)
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return None;
        }
        let deltas: Vec<f64> = measurements
            .iter()
            .filter(|m| m.value.is_finite())
            .map(|m| if m.delta.is_finite() { m.delta.abs() } else { 0.0 })
            .collect();

        let samples = values.len();
        let data = Data::new(values);
        let mean = data.mean()?;
        let std_dev = if samples > 1 {
            data.std_dev().unwrap_or(0.0)
        } else {
            0.0
        };

        Some(Self {
            samples,
            min: data.min(),
            max: data.max(),
            mean,
            median: data.median(),
            median_delta: Data::new(deltas).median(),
            std_dev,
        })
    }

    /// Coefficient of variation, `std_dev / |mean|`.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        if self.mean.abs() > f64::EPSILON {
            Some(self.std_dev / self.mean.abs())
        } else {
            None
        }
    }

    /// Typical relative noise band, `median_delta / |median|`.
    pub fn relative_range(&self) -> Option<f64> {
        if self.median.abs() > f64::EPSILON {
            Some(self.median_delta / self.median.abs())
        } else {
            None
        }
    }

    pub fn band_low(&self) -> f64 {
        self.median - self.median_delta
    }

    pub fn band_high(&self) -> f64 {
        self.median + self.median_delta
    }
}
