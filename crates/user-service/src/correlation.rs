//! Correlation context threaded through every orchestration step.
//!
//! A [`CorrelationContext`] identifies one inbound request across process and
//! network boundaries. It is created at the edge (from an incoming W3C
//! `traceparent` header when one is present), passed by value into the
//! orchestrators, and serialized back into headers on every outbound call. It
//! also carries the caller's deadline; [`CorrelationContext::bound`] turns an
//! expired deadline into [`ServiceError::DeadlineExceeded`].
//!
//! When spans are exported, the ids come from the exported spans instead of
//! being generated here: [`link_remote_parent`] makes the caller's span the
//! parent of the request span, [`CorrelationContext::with_current_span`] adopts
//! the request span, and [`CorrelationContext::outbound`] names the calling
//! span as the parent of a downstream request.

use crate::error::ServiceError;
use opentelemetry::trace::TraceContextExt;
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// W3C trace-context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";
/// Request id header echoed to downstream services.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    trace_id: String,
    span_id: String,
    parent_span_id: Option<String>,
    request_id: String,
    deadline: Option<Instant>,
}

impl CorrelationContext {
    /// Starts a fresh trace with no deadline.
    pub fn new_root() -> Self {
        Self {
            trace_id: random_hex_id::<16>(),
            span_id: random_hex_id::<8>(),
            parent_span_id: None,
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline: None,
        }
    }

    /// Builds a context from inbound header values.
    ///
    /// A well-formed `traceparent` joins the caller's trace (its span becomes
    /// our parent); anything else starts a new trace. A blank request id is
    /// replaced with a generated one.
    pub fn from_incoming(traceparent: Option<&str>, request_id: Option<&str>) -> Self {
        let mut ctx = traceparent
            .and_then(parse_traceparent)
            .map(|(trace_id, parent)| Self {
                trace_id,
                span_id: random_hex_id::<8>(),
                parent_span_id: Some(parent),
                request_id: String::new(),
                deadline: None,
            })
            .unwrap_or_else(Self::new_root);

        ctx.request_id = match request_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        ctx
    }

    /// Sets the deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Adopts the ids of the current exported span, if there is one.
    pub fn with_current_span(mut self) -> Self {
        if let Some((trace_id, span_id)) = exported_span_ids() {
            self.trace_id = trace_id;
            self.span_id = span_id;
        }
        self
    }

    /// A context for an outbound request. The current exported span becomes
    /// the remote side's parent when it belongs to this trace; otherwise this
    /// is [`Self::child`].
    pub fn outbound(&self) -> Self {
        match exported_span_ids() {
            Some((trace_id, span_id)) if trace_id == self.trace_id => Self {
                trace_id,
                span_id,
                parent_span_id: Some(self.span_id.clone()),
                request_id: self.request_id.clone(),
                deadline: self.deadline,
            },
            _ => self.child(),
        }
    }

    /// A context for an outbound call: same trace, new span, this span as parent.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: random_hex_id::<8>(),
            parent_span_id: Some(self.span_id.clone()),
            request_id: self.request_id.clone(),
            deadline: self.deadline,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        self.parent_span_id.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// `traceparent` value for this span (sampled flag always set).
    pub fn traceparent(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.span_id)
    }

    /// Header pairs to attach to an outbound request or message.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (TRACEPARENT_HEADER, self.traceparent()),
            (REQUEST_ID_HEADER, self.request_id.clone()),
        ]
    }

    /// Runs `fut` under this context's deadline.
    ///
    /// When the deadline passes first the future is dropped (cancelling any
    /// in-flight sub-call) and `DeadlineExceeded(step)` is returned.
    pub async fn bound<F>(&self, step: &'static str, fut: F) -> Result<F::Output, ServiceError>
    where
        F: Future,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| ServiceError::DeadlineExceeded(step)),
            None => Ok(fut.await),
        }
    }
}

/// Makes the span named by an inbound `traceparent` the exported parent of
/// `span`. No-op without a registered propagator or a valid header.
pub fn link_remote_parent(span: &tracing::Span, traceparent: Option<&str>) {
    let Some(value) = traceparent else {
        return;
    };
    let carrier = HashMap::from([(TRACEPARENT_HEADER.to_string(), value.to_string())]);
    let parent = opentelemetry::global::get_text_map_propagator(|propagator| propagator.extract(&carrier));
    if parent.span().span_context().is_valid() {
        let _ = span.set_parent(parent);
    }
}

/// Trace and span id of the current span as exported, if spans are exported.
fn exported_span_ids() -> Option<(String, String)> {
    let context = tracing::Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    span_context
        .is_valid()
        .then(|| (span_context.trace_id().to_string(), span_context.span_id().to_string()))
}

/// Parses `00-<32 hex>-<16 hex>-<2 hex>`, rejecting all-zero ids.
fn parse_traceparent(value: &str) -> Option<(String, String)> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let span_id = parts.next()?;
    let flags = parts.next()?;

    let valid = version.len() == 2
        && version != "ff"
        && is_hex_id(trace_id, 32)
        && is_hex_id(span_id, 16)
        && flags.len() == 2
        && flags.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| (trace_id.to_ascii_lowercase(), span_id.to_ascii_lowercase()))
}

fn is_hex_id(value: &str, len: usize) -> bool {
    value.len() == len
        && value.chars().all(|c| c.is_ascii_hexdigit())
        && value.chars().any(|c| c != '0')
}

/// Random non-zero id of `N` bytes rendered as lowercase hex.
fn random_hex_id<const N: usize>() -> String {
    let mut rng = rand::rng();
    loop {
        let bytes: [u8; N] = rng.random();
        if bytes.iter().any(|b| *b != 0) {
            return bytes.iter().map(|b| format!("{b:02x}")).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_context_has_valid_ids() {
        let ctx = CorrelationContext::new_root();
        assert_eq!(ctx.trace_id().len(), 32);
        assert_eq!(ctx.span_id().len(), 16);
        assert!(ctx.parent_span_id().is_none());
        assert!(!ctx.request_id().is_empty());
        assert!(parse_traceparent(&ctx.traceparent()).is_some());
    }

    #[test]
    fn test_incoming_traceparent_is_joined() {
        let header = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
        let ctx = CorrelationContext::from_incoming(Some(header), Some("req-1"));

        assert_eq!(ctx.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_span_id(), Some("00f067aa0ba902b7"));
        assert_ne!(ctx.span_id(), "00f067aa0ba902b7");
        assert_eq!(ctx.request_id(), "req-1");
    }

    #[test]
    fn test_malformed_traceparent_starts_new_trace() {
        for header in [
            "garbage",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-xyz-01",
        ] {
            let ctx = CorrelationContext::from_incoming(Some(header), Some("  "));
            assert!(ctx.parent_span_id().is_none(), "{header}");
            assert!(!ctx.request_id().trim().is_empty());
        }
    }

    #[test]
    fn test_child_keeps_trace_and_links_parent() {
        let root = CorrelationContext::new_root().with_timeout(Duration::from_secs(5));
        let child = root.child();

        assert_eq!(child.trace_id(), root.trace_id());
        assert_eq!(child.parent_span_id(), Some(root.span_id()));
        assert_eq!(child.request_id(), root.request_id());
        assert_eq!(child.deadline(), root.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_reports_deadline_exceeded() {
        let ctx = CorrelationContext::new_root().with_timeout(Duration::from_millis(100));

        let result = ctx
            .bound("slow_step", tokio::time::sleep(Duration::from_secs(1)))
            .await;
        assert!(matches!(result, Err(ServiceError::DeadlineExceeded("slow_step"))));
        assert!(ctx.is_expired());
    }

    #[test]
    fn test_outbound_without_exported_spans_is_a_child() {
        let ctx = CorrelationContext::new_root().with_current_span();
        let outbound = ctx.outbound();
        assert_eq!(outbound.trace_id(), ctx.trace_id());
        assert_eq!(outbound.parent_span_id(), Some(ctx.span_id()));
        assert_ne!(outbound.span_id(), ctx.span_id());
    }

    #[test]
    fn test_exported_spans_carry_the_incoming_trace() {
        use opentelemetry::trace::TracerProvider as _;
        use opentelemetry_sdk::propagation::TraceContextPropagator;
        use opentelemetry_sdk::trace::SdkTracerProvider;
        use tracing_subscriber::layer::SubscriberExt;

        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let provider = SdkTracerProvider::builder().build();
        let subscriber =
            tracing_subscriber::registry().with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")));

        tracing::subscriber::with_default(subscriber, || {
            let header = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
            let request = tracing::info_span!("request");
            link_remote_parent(&request, Some(header));
            let _request = request.enter();

            let ctx = CorrelationContext::from_incoming(Some(header), None).with_current_span();
            let request_span_id = request.context().span().span_context().span_id().to_string();
            assert_eq!(ctx.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
            assert_eq!(ctx.span_id(), request_span_id);
            assert_eq!(ctx.parent_span_id(), Some("00f067aa0ba902b7"));

            let call = tracing::info_span!("create_order");
            let _call = call.enter();
            let outbound = ctx.outbound();
            let call_span_id = call.context().span().span_context().span_id().to_string();
            assert_eq!(outbound.trace_id(), ctx.trace_id());
            assert_eq!(outbound.span_id(), call_span_id);
            assert_eq!(outbound.parent_span_id(), Some(ctx.span_id()));
            assert!(outbound.traceparent().contains(&call_span_id));
        });
    }

    #[tokio::test]
    async fn test_bound_without_deadline_runs_to_completion() {
        let ctx = CorrelationContext::new_root();
        assert_eq!(ctx.bound("fast_step", async { 7 }).await.unwrap(), 7);
        assert_eq!(ctx.remaining(), None);
    }
}
