//! # Backing Resources
//!
//! Every backing service the user service depends on is reached through a
//! [`ResourceHandle`]: something that can be connected, health-probed and
//! closed. The lifecycle manager drives these handles; the orchestrators only
//! see the narrower capability traits ([`store::DocumentStore`],
//! [`producer::EventProducer`]).
//!
//! - [`store`] - embedded document store holding user records
//! - [`producer`] - embedded partitioned event stream for audit events
//! - [`telemetry`] - OTLP trace exporter

pub mod producer;
pub mod store;
pub mod telemetry;

use crate::resources::producer::ProducerError;
use crate::resources::store::StoreError;
use crate::resources::telemetry::TelemetryError;
use crate::retry::RetryError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Store,
    Producer,
    TraceExporter,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Store => "document store",
            ResourceKind::Producer => "event stream",
            ResourceKind::TraceExporter => "trace exporter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error("warm-up publish failed: {0}")]
    Warmup(#[from] RetryError<ProducerError>),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// A connected, health-checkable, closeable reference to a backing service.
///
/// Implementations own their connection behind interior mutability so the
/// lifecycle manager can share them as `Arc<dyn ResourceHandle>`. `close` must
/// be idempotent and must never reopen anything.
#[async_trait]
pub trait ResourceHandle: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Human readable target, e.g. `demo.users` or `localhost:9092/demoTopic`.
    fn name(&self) -> String;

    async fn connect(&self) -> Result<(), ResourceError>;

    async fn health_probe(&self) -> Result<(), ResourceError>;

    async fn close(&self) -> Result<(), ResourceError>;
}

/// Checks that a TLS file was configured and can be read.
pub(crate) async fn require_readable(path: Option<&Path>, what: &str) -> Result<(), String> {
    let path = path.ok_or_else(|| format!("{what} is required in secured mode"))?;
    tokio::fs::File::open(path)
        .await
        .map(|_| ())
        .map_err(|e| format!("{what} {} is not readable: {e}", path.display()))
}
