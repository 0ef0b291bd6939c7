pub mod alert;
pub mod policy;
pub mod stats;
pub mod verdict;

pub use alert::AlertRecord;
pub use policy::{ComparisonPolicy, ThresholdPolicy};
pub use stats::SeriesStats;
pub use verdict::{Comparison, Verdict, VerdictKind};
