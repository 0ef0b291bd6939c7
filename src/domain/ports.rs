use crate::domain::regression::AlertRecord;
use anyhow::Result;
use async_trait::async_trait;

/// Outbound channel for detector results (chat notifier, CI annotation, ...).
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, alerts: &[AlertRecord]) -> Result<()>;
}
