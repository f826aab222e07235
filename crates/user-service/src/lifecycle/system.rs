use crate::audit::{AuditEmitter, AuditSnapshot, AuditStats, DeliveryWorker};
use crate::clients::{HttpOrderService, OrderService};
use crate::config::ServiceConfig;
use crate::lifecycle::manager::{LifecycleError, LifecycleManager, ShutdownGate, ShutdownReport};
use crate::orchestrator::{RandomIds, UserReader, UserWriter};
use crate::resources::producer::EmbeddedEventStream;
use crate::resources::store::EmbeddedDocumentStore;
use crate::resources::telemetry::TraceExporter;
use crate::resources::ResourceKind;
use crate::web::{self, AppState};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Capacity of the delivery-report queue between the audit emitter and its worker.
const DELIVERY_REPORT_CAPACITY: usize = 1024;

/// The running service: resources, orchestrators and the pieces needed to
/// tear them down.
///
/// `UserServiceSystem` is responsible for:
/// - **Dependency wiring**: the store and the event stream are built once and
///   handed to the orchestrators; nothing is reachable through globals.
/// - **Lifecycle**: resources are started as a unit by the
///   [`LifecycleManager`] and closed under one deadline by [`Self::shutdown`].
///
/// # Example
///
/// ```ignore
/// let system = UserServiceSystem::start(&config, None).await?;
/// let app = system.router();
/// // ... serve `app` ...
/// let report = system.shutdown(Instant::now() + config.shutdown_grace()).await;
/// ```
pub struct UserServiceSystem {
    writer: UserWriter,
    reader: UserReader,
    lifecycle: LifecycleManager,
    store: Arc<EmbeddedDocumentStore>,
    events: Arc<EmbeddedEventStream>,
    audit_stats: Arc<AuditStats>,
    worker: DeliveryWorker,
    request_timeout: Duration,
}

impl UserServiceSystem {
    /// Builds every resource, starts them through the lifecycle manager and
    /// wires the orchestrators. Fails without leaving anything open.
    pub async fn start(config: &ServiceConfig, exporter: Option<Arc<TraceExporter>>) -> Result<Self, LifecycleError> {
        let orders: Arc<dyn OrderService> = Arc::new(
            HttpOrderService::new(&config.order_service_url(), config.order_service_timeout())
                .map_err(|e| LifecycleError::Config(e.to_string()))?,
        );
        let store = Arc::new(EmbeddedDocumentStore::new(config.store_settings()));
        let events = Arc::new(EmbeddedEventStream::new(config.event_settings()));

        let mut lifecycle = LifecycleManager::new(config.startup_timeout())
            .with_resource(store.clone())
            .with_resource(events.clone());
        if let Some(exporter) = exporter {
            lifecycle.register(exporter);
        }
        lifecycle.start_all().await?;

        let gate = lifecycle.gate();
        let (audit, worker) = AuditEmitter::spawn(events.clone(), config.event_retry_policy(), DELIVERY_REPORT_CAPACITY);
        let audit_stats = audit.shared_stats();

        let writer = UserWriter::new(
            store.clone(),
            audit.clone(),
            orders.clone(),
            Arc::new(RandomIds::new(config.user_id_space)),
            config.id_allocation_attempts,
            gate.clone(),
        )
        .with_audit_reserve(config.order_service_timeout());
        let reader = UserReader::new(store.clone(), orders, audit, gate).with_audit_reserve(config.order_service_timeout());

        info!(
            order_service = %config.order_service_url(),
            dev_mode = config.dev_mode,
            "User service system started"
        );
        Ok(Self {
            writer,
            reader,
            lifecycle,
            store,
            events,
            audit_stats,
            worker,
            request_timeout: config.request_timeout(),
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            writer: self.writer.clone(),
            reader: self.reader.clone(),
            request_timeout: self.request_timeout,
        }
    }

    pub fn router(&self) -> Router {
        web::router(self.app_state())
    }

    pub fn writer(&self) -> &UserWriter {
        &self.writer
    }

    pub fn reader(&self) -> &UserReader {
        &self.reader
    }

    pub fn gate(&self) -> ShutdownGate {
        self.lifecycle.gate()
    }

    pub fn health(&self) -> Vec<(ResourceKind, bool)> {
        self.lifecycle.health()
    }

    pub fn store(&self) -> &Arc<EmbeddedDocumentStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EmbeddedEventStream> {
        &self.events
    }

    pub fn audit_stats(&self) -> AuditSnapshot {
        self.audit_stats.snapshot()
    }

    /// Closes the gate and every resource before `deadline`, then lets the
    /// delivery worker drain.
    ///
    /// Router clones still held elsewhere keep the worker alive; it is aborted
    /// at the deadline in that case.
    pub async fn shutdown(self, deadline: Instant) -> ShutdownReport {
        info!("Shutting down user service system...");
        let report = self.lifecycle.stop_all(deadline).await;

        let Self {
            writer,
            reader,
            worker,
            audit_stats,
            ..
        } = self;
        drop(writer);
        drop(reader);
        if !worker.join(deadline).await {
            warn!("Delivery worker did not drain before the deadline");
        }

        info!(audit = ?audit_stats.snapshot(), clean = report.is_clean(), "User service system shut down");
        report
    }
}
