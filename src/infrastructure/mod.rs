pub mod alerts;
pub mod benchmark_data;
pub mod observability;
pub mod persistence;
pub mod repositories;

pub use alerts::{ChannelAlertSink, TracingAlertSink};
pub use repositories::InMemoryHistoryBackend;
