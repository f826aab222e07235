//! OTLP trace exporter, managed like any other backing resource.
//!
//! The tracer provider is built eagerly so the logging layer can be installed
//! before anything else starts. Connecting is a no-op; the health probe flushes
//! pending spans and `close` shuts the provider down exactly once.

use crate::resources::{ResourceError, ResourceHandle, ResourceKind};
use async_trait::async_trait;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP exporter for {endpoint}: {message}")]
    Build { endpoint: String, message: String },

    #[error("trace exporter flush failed: {0}")]
    Flush(String),

    #[error("trace exporter shutdown failed: {0}")]
    Shutdown(String),

    #[error("trace exporter task failed: {0}")]
    Join(String),
}

pub struct TraceExporter {
    endpoint: String,
    provider: SdkTracerProvider,
    closed: AtomicBool,
}

impl TraceExporter {
    /// Builds a batching OTLP/gRPC pipeline towards `endpoint`.
    pub fn new(endpoint: &str, service_name: &str) -> Result<Self, TelemetryError> {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| TelemetryError::Build {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(Resource::builder().with_service_name(service_name.to_string()).build())
            .build();

        Ok(Self {
            endpoint: endpoint.to_string(),
            provider,
            closed: AtomicBool::new(false),
        })
    }

    pub fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }
}

#[async_trait]
impl ResourceHandle for TraceExporter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::TraceExporter
    }

    fn name(&self) -> String {
        self.endpoint.clone()
    }

    async fn connect(&self) -> Result<(), ResourceError> {
        debug!(endpoint = %self.endpoint, "Trace pipeline already built");
        Ok(())
    }

    async fn health_probe(&self) -> Result<(), ResourceError> {
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || provider.force_flush())
            .await
            .map_err(|e| TelemetryError::Join(e.to_string()))?
            .map_err(|e| TelemetryError::Flush(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ResourceError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || provider.shutdown())
            .await
            .map_err(|e| TelemetryError::Join(e.to_string()))?
            .map_err(|e| TelemetryError::Shutdown(e.to_string()))?;
        info!(endpoint = %self.endpoint, "Trace exporter shut down");
        Ok(())
    }
}
