pub mod ingestor;
pub mod payload;

pub use ingestor::{DEFAULT_UNITS, IngestSettings, Ingestor};
pub use payload::{RawBench, RawCommit, RawPerson, RawRun, parse_range};
