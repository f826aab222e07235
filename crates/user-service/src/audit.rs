//! # Audit Events
//!
//! State changes and lookups are announced on the event stream. Publishing
//! goes through the [`RetryPolicy`]; whatever the outcome, a
//! [`DeliveryReport`] is handed to a single [`DeliveryWorker`] over a bounded
//! channel. The worker folds reports into [`AuditStats`]. When the channel is
//! full the report is dropped and counted instead of blocking the request.

use crate::correlation::CorrelationContext;
use crate::error::ServiceError;
use crate::resources::producer::{Delivery, EventProducer};
use crate::retry::{RetryError, RetryPolicy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { partition: u32, offset: u64 },
    Failed { reason: String, exhausted: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub key: String,
    pub outcome: DeliveryOutcome,
}

/// Counters fed by the delivery worker (and by the emitter for dropped reports).
#[derive(Debug, Default)]
pub struct AuditStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    retry_exhausted: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSnapshot {
    pub delivered: u64,
    pub failed: u64,
    pub retry_exhausted: u64,
    pub dropped: u64,
}

impl AuditStats {
    pub fn snapshot(&self) -> AuditSnapshot {
        AuditSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retry_exhausted: self.retry_exhausted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: &DeliveryReport) {
        match &report.outcome {
            DeliveryOutcome::Delivered { .. } => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::Failed { exhausted, .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                if *exhausted {
                    self.retry_exhausted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

/// Publishes audit events. Cheap to clone.
#[derive(Clone)]
pub struct AuditEmitter {
    producer: Arc<dyn EventProducer>,
    policy: RetryPolicy,
    reports: mpsc::Sender<DeliveryReport>,
    stats: Arc<AuditStats>,
}

/// Drains delivery reports until every emitter clone is gone.
pub struct DeliveryWorker {
    handle: JoinHandle<()>,
}

impl AuditEmitter {
    /// Creates the emitter and spawns its delivery worker. `capacity` bounds
    /// the report queue.
    pub fn spawn(producer: Arc<dyn EventProducer>, policy: RetryPolicy, capacity: usize) -> (Self, DeliveryWorker) {
        let (reports, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(AuditStats::default());
        let handle = tokio::spawn(drain_reports(receiver, stats.clone()));

        let emitter = Self {
            producer,
            policy,
            reports,
            stats,
        };
        (emitter, DeliveryWorker { handle })
    }

    /// Publishes `message` with routing key `key`, retrying transient failures.
    pub async fn emit(&self, ctx: &CorrelationContext, key: &str, message: &str) -> Result<Delivery, ServiceError> {
        let result = self
            .policy
            .run("publish audit event", |_| self.producer.write_message(ctx, key, message))
            .await;

        let outcome = match &result {
            Ok(delivery) => DeliveryOutcome::Delivered {
                partition: delivery.partition,
                offset: delivery.offset,
            },
            Err(e) => DeliveryOutcome::Failed {
                reason: e.to_string(),
                exhausted: matches!(e, RetryError::Exhausted { .. }),
            },
        };
        self.report(DeliveryReport {
            key: key.to_string(),
            outcome,
        });

        result.map_err(ServiceError::from)
    }

    fn report(&self, report: DeliveryReport) {
        match self.reports.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(report)) | Err(TrySendError::Closed(report)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(key = %report.key, "Delivery report dropped");
            }
        }
    }

    pub fn stats(&self) -> AuditSnapshot {
        self.stats.snapshot()
    }

    pub fn shared_stats(&self) -> Arc<AuditStats> {
        self.stats.clone()
    }
}

impl DeliveryWorker {
    /// Waits for the worker to drain, aborting it at `deadline`. Returns
    /// `true` when it finished on its own.
    pub async fn join(self, deadline: Instant) -> bool {
        let abort = self.handle.abort_handle();
        match tokio::time::timeout_at(deadline, self.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Delivery worker ended abnormally");
                false
            }
            Err(_) => {
                warn!("Delivery worker still running at the deadline, aborting");
                abort.abort();
                false
            }
        }
    }
}

async fn drain_reports(mut receiver: mpsc::Receiver<DeliveryReport>, stats: Arc<AuditStats>) {
    while let Some(report) = receiver.recv().await {
        stats.record(&report);
        match &report.outcome {
            DeliveryOutcome::Delivered { partition, offset } => {
                debug!(key = %report.key, partition, offset, "Audit event delivered");
            }
            DeliveryOutcome::Failed { reason, exhausted } => {
                warn!(key = %report.key, reason = %reason, exhausted, "Audit event not delivered");
            }
        }
    }
    debug!(stats = ?stats.snapshot(), "Delivery worker stopped");
}
