//! # Orchestration
//!
//! The multi-step operations behind the HTTP routes.
//!
//! - [`UserWriter`] creates users: validate, persist, then the best-effort
//!   audit event and order provisioning.
//! - [`UserReader`] serves lookups, including the aggregated user-with-order
//!   read that fails as a whole when either half fails.
//!
//! Both take every dependency through their constructor and the correlation
//! context as an explicit argument on every call. Both refuse new work once
//! the shutdown gate is closed.
//!
//! Audit events never consume the whole request deadline: publishing is cut
//! off a reserve before the deadline so the steps that follow still get to
//! run, and a cut-off publish is logged like any other audit failure.

pub mod ids;
pub mod read;
pub mod write;

pub use ids::{IdSource, RandomIds};
pub use read::UserReader;
pub use write::UserWriter;

use crate::audit::AuditEmitter;
use crate::correlation::CorrelationContext;
use crate::error::ServiceError;
use crate::resources::producer::Delivery;
use std::time::Duration;
use tokio::time::Instant;

/// Time kept back from the request deadline for the steps after an audit
/// event. Matches the default order-service timeout.
pub const DEFAULT_AUDIT_RESERVE: Duration = Duration::from_secs(10);

/// Publishes an audit event, giving up `reserve` before the request deadline.
async fn publish_within_budget(
    audit: &AuditEmitter,
    ctx: &CorrelationContext,
    reserve: Duration,
    key: &str,
    message: &str,
) -> Result<Delivery, ServiceError> {
    let publish = audit.emit(ctx, key, message);
    match ctx.deadline() {
        Some(deadline) => {
            let cutoff = deadline.checked_sub(reserve).unwrap_or_else(Instant::now);
            tokio::time::timeout_at(cutoff, publish)
                .await
                .unwrap_or_else(|_| Err(ServiceError::DeadlineExceeded("publish audit event")))
        }
        None => publish.await,
    }
}

fn require_id(id: &str) -> Result<&str, ServiceError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ServiceError::Validation("user id must not be blank".to_string()));
    }
    Ok(id)
}
