use crate::domain::ports::AlertSink;
use crate::domain::regression::{AlertRecord, VerdictKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

/// Writes every alert as a structured log line.
#[derive(Debug, Default, Clone)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn publish(&self, alerts: &[AlertRecord]) -> Result<()> {
        for alert in alerts {
            let payload = serde_json::to_string(alert).context("Failed to encode alert")?;
            match alert.verdict {
                VerdictKind::Regressed => warn!(target: "benchtrail::alerts", "{}", payload),
                _ => info!(target: "benchtrail::alerts", "{}", payload),
            }
        }
        Ok(())
    }
}

/// Forwards alerts to an in-process consumer.
///
/// Publishing never waits on the consumer: alerts that do not fit in the
/// channel are dropped and reported as an error.
#[derive(Clone)]
pub struct ChannelAlertSink {
    sender: mpsc::Sender<AlertRecord>,
}

impl ChannelAlertSink {
    pub fn new(sender: mpsc::Sender<AlertRecord>) -> Self {
        Self { sender }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl AlertSink for ChannelAlertSink {
    async fn publish(&self, alerts: &[AlertRecord]) -> Result<()> {
        let mut dropped = 0;
        for alert in alerts {
            match self.sender.try_send(alert.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => dropped += 1,
                Err(TrySendError::Closed(_)) => anyhow::bail!("Alert receiver dropped"),
            }
        }
        if dropped > 0 {
            anyhow::bail!(
                "Alert channel full: dropped {} of {} alerts",
                dropped,
                alerts.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::benchmark::SeriesKey;

    fn alert() -> AlertRecord {
        AlertRecord {
            key: SeriesKey::new("Benchmark", "Infoflow (min)/Flow"),
            verdict: VerdictKind::Regressed,
            candidate_value: 150.0,
            baseline_value: Some(100.0),
            ratio: Some(1.5),
            commit_id: "abc123".to_string(),
            noisy: false,
        }
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelAlertSink::channel(4);
        let mut second = alert();
        second.commit_id = "def456".to_string();

        sink.publish(&[alert(), second]).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().commit_id, "abc123");
        assert_eq!(rx.recv().await.unwrap().commit_id, "def456");
    }

    #[tokio::test]
    async fn test_channel_sink_drops_overflow_without_waiting() {
        let (sink, mut rx) = ChannelAlertSink::channel(1);
        let mut second = alert();
        second.commit_id = "def456".to_string();

        let err = sink.publish(&[alert(), second]).await.unwrap_err();
        assert!(err.to_string().contains("dropped 1 of 2"));

        assert_eq!(rx.recv().await.unwrap().commit_id, "abc123");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_channel_sink_fails_when_receiver_dropped() {
        let (sink, rx) = ChannelAlertSink::channel(1);
        drop(rx);
        assert!(sink.publish(&[alert()]).await.is_err());
    }
}
