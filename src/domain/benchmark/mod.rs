pub mod measurement;
pub mod run;
pub mod series;

pub use measurement::{Measurement, Polarity};
pub use run::{CommitRef, Person, Run};
pub use series::{SeriesKey, TimeRange};
