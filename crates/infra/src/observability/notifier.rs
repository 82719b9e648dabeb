use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::Level;

/// Alerts waiting for delivery. A burst of storage failures beyond this is
/// summarized as a `dropped_alerts` count on the next alert that gets through.
pub(crate) const ALERT_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub(crate) struct AlertSpan {
    pub(crate) name: String,
    pub(crate) fields: BTreeMap<String, String>,
}

/// One log event at alert level, with secrets already redacted.
#[derive(Clone, Debug)]
pub(crate) struct BillingAlert {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    /// `backend` or `worker`.
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) file: Option<String>,
    pub(crate) line: Option<u32>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) spans: Vec<AlertSpan>,
}

impl BillingAlert {
    /// Set by `storage_failure` when a ledger transaction was rolled back.
    pub(crate) fn is_invariant_violation(&self) -> bool {
        self.fields.get("invariant_violation").map(String::as_str) == Some("true")
    }
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn send(&self, alert: &BillingAlert) -> Result<()>;
    fn name(&self) -> &'static str;
}

#[derive(Clone)]
pub(crate) struct AlertQueue {
    tx: mpsc::Sender<BillingAlert>,
    dropped: Arc<AtomicU64>,
}

impl AlertQueue {
    pub(crate) fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self::with_capacity(sinks, ALERT_QUEUE_CAPACITY)
    }

    pub(crate) fn with_capacity(sinks: Vec<Arc<dyn AlertSink>>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<BillingAlert>(capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let worker_dropped = Arc::clone(&dropped);

        tokio::spawn(async move {
            while let Some(mut alert) = rx.recv().await {
                let missed = worker_dropped.swap(0, Ordering::Relaxed);
                if missed > 0 {
                    alert
                        .fields
                        .insert("dropped_alerts".to_string(), missed.to_string());
                }
                for sink in &sinks {
                    // tracing here would loop back into the alert layer.
                    if let Err(error) = sink.send(&alert).await {
                        eprintln!("observability: {} sink failed: {error}", sink.name());
                    }
                }
            }
        });

        Self { tx, dropped }
    }

    /// Never waits: a full queue counts the alert as dropped.
    pub(crate) fn enqueue(&self, alert: BillingAlert) {
        match self.tx.try_send(alert) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                eprintln!("observability: alert queue closed, alert lost");
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_alert(message: &str) -> BillingAlert {
    BillingAlert {
        level: Level::ERROR,
        timestamp: Utc::now(),
        service_name: "billing".to_string(),
        environment: "test".to_string(),
        component: "backend".to_string(),
        target: "application::errors".to_string(),
        file: None,
        line: None,
        message: Some(message.to_string()),
        fields: BTreeMap::new(),
        spans: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Semaphore;

    struct GatedSink {
        started: mpsc::UnboundedSender<()>,
        gate: Arc<Semaphore>,
        seen: mpsc::UnboundedSender<BillingAlert>,
    }

    #[async_trait]
    impl AlertSink for GatedSink {
        async fn send(&self, alert: &BillingAlert) -> Result<()> {
            let _ = self.started.send(());
            self.gate.acquire().await?.forget();
            let _ = self.seen.send(alert.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn overflow_is_reported_on_the_next_delivered_alert() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        let queue = AlertQueue::with_capacity(
            vec![Arc::new(GatedSink {
                started: started_tx,
                gate: Arc::clone(&gate),
                seen: seen_tx,
            })],
            1,
        );

        queue.enqueue(test_alert("storage failure 1"));
        started_rx.recv().await.unwrap();
        // The sink holds the first alert, the queue holds the second.
        queue.enqueue(test_alert("storage failure 2"));
        queue.enqueue(test_alert("storage failure 3"));
        gate.add_permits(10);

        let first = seen_rx.recv().await.unwrap();
        assert_eq!(first.message.as_deref(), Some("storage failure 1"));
        assert!(!first.fields.contains_key("dropped_alerts"));

        let second = seen_rx.recv().await.unwrap();
        assert_eq!(second.message.as_deref(), Some("storage failure 2"));
        assert_eq!(second.fields["dropped_alerts"], "1");
    }

    #[test]
    fn invariant_flag_is_read_from_fields() {
        let mut alert = test_alert("ledger: invariant violated, transaction rolled back");
        assert!(!alert.is_invariant_violation());
        alert
            .fields
            .insert("invariant_violation".to_string(), "true".to_string());
        assert!(alert.is_invariant_violation());
    }
}
