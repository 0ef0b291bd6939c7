pub mod detector;

pub use detector::{
    Detection, DetectionReport, DetectorSettings, NoisySeriesAction, RegressionDetector,
};
