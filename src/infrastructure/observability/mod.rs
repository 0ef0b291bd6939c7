//! Push-based observability for benchtrail
//!
//! Metrics are collected in a Prometheus registry and only ever rendered
//! outbound (CLI output, logs). There is no HTTP endpoint.

pub mod metrics;

pub use metrics::Metrics;
