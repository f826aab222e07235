//! # Logging & Trace Export
//!
//! [`setup_tracing`] installs the global subscriber: an `EnvFilter` driven by
//! `RUST_LOG` (default `info`), a formatter, and, when a [`TraceExporter`] is
//! supplied, a `tracing-opentelemetry` layer that ships spans over OTLP and a
//! W3C trace-context propagator so inbound `traceparent` headers become span
//! parents.
//!
//! Two formats are available:
//!
//! - **compact** (default): hides the module prefix (`with_target(false)`) and
//!   shows spans inline, which keeps development logs short.
//! - **json**: one object per line with the current span attached, for log
//!   shippers.
//!
//! ```bash
//! # Compact logs (default)
//! RUST_LOG=info user-service
//!
//! # Full payloads at orchestration entry points
//! RUST_LOG=debug user-service
//!
//! # Only the actor collections
//! RUST_LOG=actor_framework=debug,info user-service
//! ```
//!
//! Every orchestration log line carries `trace_id` and `request_id` fields, so
//! lines can be joined with spans in the trace backend.

use crate::config::LogFormat;
use crate::resources::telemetry::TraceExporter;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

pub fn setup_tracing(format: LogFormat, exporter: Option<&TraceExporter>) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .with_target(false) // Module paths add noise; fields carry the context.
            .compact()
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
    };

    let otel_layer = exporter.map(|exporter| {
        let provider = exporter.provider().clone();
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        opentelemetry::global::set_tracer_provider(provider.clone());
        tracing_opentelemetry::layer().with_tracer(provider.tracer("user-service"))
    });

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter)
        .try_init()
}
