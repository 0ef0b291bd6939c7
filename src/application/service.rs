//! Ingestion pipeline: validate → append → detect → alert.

use crate::application::bootstrap::PersistenceBootstrap;
use crate::application::history_store::{AppendReceipt, DuplicatePolicy, HistoryStore};
use crate::application::ingest::Ingestor;
use crate::application::query::QueryApi;
use crate::application::regression::{DetectionReport, RegressionDetector};
use crate::config::Config;
use crate::domain::errors::{ImportError, IngestError, StoreError};
use crate::domain::ports::AlertSink;
use crate::domain::repositories::HistoryBackend;
use crate::infrastructure::alerts::TracingAlertSink;
use crate::infrastructure::benchmark_data::BenchmarkDataFile;
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of one accepted CI payload.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub receipt: AppendReceipt,
    pub report: DetectionReport,
}

pub struct BenchmarkService {
    store: Arc<HistoryStore>,
    ingestor: Ingestor,
    detector: RegressionDetector,
    alert_sink: Arc<dyn AlertSink>,
    metrics: Option<Metrics>,
}

impl BenchmarkService {
    pub fn new(
        store: Arc<HistoryStore>,
        ingestor: Ingestor,
        detector: RegressionDetector,
        alert_sink: Arc<dyn AlertSink>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            store,
            ingestor,
            detector,
            alert_sink,
            metrics,
        }
    }

    /// Wire a service from configuration, opening the configured backend.
    pub async fn build(config: &Config) -> Result<Self> {
        let backend = PersistenceBootstrap::init(&config.store).await?;
        Self::with_backend(config, backend, Arc::new(TracingAlertSink)).await
    }

    pub async fn with_backend(
        config: &Config,
        backend: Arc<dyn HistoryBackend>,
        alert_sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        let store = Arc::new(
            HistoryStore::open(backend, config.store.duplicate_policy)
                .await
                .context("Failed to open history store")?,
        );
        let ingestor = Ingestor::new(store.clone(), config.ingest.settings());
        let detector = RegressionDetector::with_threshold(
            config.detector.settings.clone(),
            config.detector.policy.clone(),
        );
        let metrics = if config.observability.metrics_enabled {
            Some(Metrics::new()?)
        } else {
            None
        };

        let service = Self::new(store, ingestor, detector, alert_sink, metrics);
        service.refresh_series_gauge().await;
        Ok(service)
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn query(&self) -> QueryApi {
        QueryApi::new(self.store.clone())
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Ingest one CI payload and classify its measurements.
    ///
    /// Ingestion errors are returned to the caller. Detection never fails the
    /// call, and neither does an alert sink error.
    pub async fn ingest_json(
        &self,
        payload: &str,
        suite: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                let err = IngestError::from(e);
                self.record_rejection(&err);
                return Err(err);
            }
        };
        self.ingest_value(&value, suite, None).await
    }

    pub async fn ingest_value(
        &self,
        value: &Value,
        suite: Option<&str>,
        policy: Option<DuplicatePolicy>,
    ) -> Result<IngestOutcome, IngestError> {
        let receipt = self.append(value, suite, policy).await?;
        let report = self.detector.evaluate_run(&self.store, &receipt.run).await;

        if let Some(metrics) = &self.metrics {
            for detection in &report.detections {
                metrics.inc_verdict(detection.verdict.kind().as_str());
            }
        }

        let alerts = report.alerts();
        if !alerts.is_empty()
            && let Err(e) = self.alert_sink.publish(&alerts).await
        {
            warn!("Failed to publish {} alerts: {:#}", alerts.len(), e);
            if let Some(metrics) = &self.metrics {
                metrics.alert_publish_failures_total.inc();
            }
        }

        Ok(IngestOutcome { receipt, report })
    }

    /// Backfill every run of a data file, without regression detection.
    ///
    /// Stops at the first failing run; runs applied before it stay in history.
    pub async fn import_data_file(&self, data: &BenchmarkDataFile) -> Result<usize, ImportError> {
        let mut applied = 0;
        for (suite, runs) in &data.entries {
            for (index, run) in runs.iter().enumerate() {
                if let Err(source) = self.append(run, Some(suite.as_str()), None).await {
                    warn!(
                        "Import stopped at {}[{}] after {} runs: {}",
                        suite, index, applied, source
                    );
                    return Err(ImportError {
                        applied,
                        suite: suite.clone(),
                        index,
                        source,
                    });
                }
                applied += 1;
            }
        }
        info!(
            "Imported {} runs from {} ({} suites)",
            applied,
            data.repo_url,
            data.entries.len()
        );
        Ok(applied)
    }

    async fn append(
        &self,
        value: &Value,
        suite: Option<&str>,
        policy: Option<DuplicatePolicy>,
    ) -> Result<AppendReceipt, IngestError> {
        let started = Instant::now();
        let result = self.ingestor.ingest_value(value, suite, policy).await;

        match &result {
            Ok(receipt) => {
                if let Some(metrics) = &self.metrics {
                    metrics
                        .append_duration_seconds
                        .observe(started.elapsed().as_secs_f64());
                    metrics.inc_ingested(&receipt.run.suite);
                }
                self.refresh_series_gauge().await;
            }
            Err(e) => self.record_rejection(e),
        }
        result
    }

    fn record_rejection(&self, err: &IngestError) {
        if let IngestError::Store(StoreError::Storage(e)) = err {
            warn!("History backend failure: {:#}", e);
        }
        if let Some(metrics) = &self.metrics {
            metrics.inc_rejected(err.reason());
        }
    }

    async fn refresh_series_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics
                .series_tracked
                .set(self.store.series_count().await as f64);
        }
    }
}
