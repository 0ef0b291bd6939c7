//! Prometheus metrics definitions for benchtrail
//!
//! All metrics use the `benchtrail_` prefix and are read-only.

use prometheus::{
    Counter, CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for ingestion and regression detection
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Runs accepted into the store, by suite
    pub runs_ingested_total: CounterVec,
    /// Runs refused, by reason
    pub runs_rejected_total: CounterVec,
    /// Detector verdicts, by kind
    pub verdicts_total: CounterVec,
    /// Alert batches a sink failed to deliver in full
    pub alert_publish_failures_total: Counter,
    /// Number of tracked series
    pub series_tracked: GenericGauge<AtomicF64>,
    /// Time spent in a durable append
    pub append_duration_seconds: Histogram,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let runs_ingested_total = CounterVec::new(
            Opts::new("benchtrail_runs_ingested_total", "Runs appended to history"),
            &["suite"],
        )?;
        registry.register(Box::new(runs_ingested_total.clone()))?;

        let runs_rejected_total = CounterVec::new(
            Opts::new("benchtrail_runs_rejected_total", "Runs refused at ingestion"),
            &["reason"],
        )?;
        registry.register(Box::new(runs_rejected_total.clone()))?;

        let verdicts_total = CounterVec::new(
            Opts::new("benchtrail_verdicts_total", "Regression verdicts by kind"),
            &["verdict"],
        )?;
        registry.register(Box::new(verdicts_total.clone()))?;

        let alert_publish_failures_total = Counter::with_opts(Opts::new(
            "benchtrail_alert_publish_failures_total",
            "Alert batches not fully delivered to the sink",
        ))?;
        registry.register(Box::new(alert_publish_failures_total.clone()))?;

        let series_tracked = Gauge::with_opts(Opts::new(
            "benchtrail_series_tracked",
            "Number of (suite, benchmark) series in history",
        ))?;
        registry.register(Box::new(series_tracked.clone()))?;

        let append_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "benchtrail_append_duration_seconds",
                "Durable append latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(append_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            runs_ingested_total,
            runs_rejected_total,
            verdicts_total,
            alert_publish_failures_total,
            series_tracked,
            append_duration_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_ingested(&self, suite: &str) {
        self.runs_ingested_total.with_label_values(&[suite]).inc();
    }

    pub fn inc_rejected(&self, reason: &str) {
        self.runs_rejected_total.with_label_values(&[reason]).inc();
    }

    pub fn inc_verdict(&self, verdict: &str) {
        self.verdicts_total.with_label_values(&[verdict]).inc();
    }
}
