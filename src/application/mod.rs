pub mod bootstrap;
pub mod history_store;
pub mod ingest;
pub mod query;
pub mod regression;
pub mod service;

pub use history_store::{AppendReceipt, DuplicatePolicy, HistoryStore, SeriesCursor, SeriesPoint};
pub use service::{BenchmarkService, IngestOutcome};
