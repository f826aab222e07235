use crate::audit::AuditEmitter;
use crate::clients::OrderService;
use crate::correlation::CorrelationContext;
use crate::error::ServiceError;
use crate::lifecycle::ShutdownGate;
use crate::model::{NewUser, UserRecord};
use crate::orchestrator::{publish_within_budget, IdSource, DEFAULT_AUDIT_RESERVE};
use crate::resources::store::{DocumentStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Runs the create-user sequence.
///
/// Persistence must succeed before anything else happens. The audit event and
/// the order provisioning that follow are best effort: their failures are
/// logged and counted, and the id is returned regardless. The audit event is
/// abandoned `audit_reserve` before the request deadline so provisioning
/// still runs when the event stream hangs.
#[derive(Clone)]
pub struct UserWriter {
    store: Arc<dyn DocumentStore>,
    audit: AuditEmitter,
    orders: Arc<dyn OrderService>,
    ids: Arc<dyn IdSource>,
    id_attempts: u32,
    gate: ShutdownGate,
    audit_reserve: Duration,
}

impl UserWriter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        audit: AuditEmitter,
        orders: Arc<dyn OrderService>,
        ids: Arc<dyn IdSource>,
        id_attempts: u32,
        gate: ShutdownGate,
    ) -> Self {
        Self {
            store,
            audit,
            orders,
            ids,
            id_attempts: id_attempts.max(1),
            gate,
            audit_reserve: DEFAULT_AUDIT_RESERVE,
        }
    }

    pub fn with_audit_reserve(mut self, reserve: Duration) -> Self {
        self.audit_reserve = reserve;
        self
    }

    /// Creates a user from a raw JSON payload and returns its new id.
    #[instrument(skip_all, fields(trace_id = ctx.trace_id(), request_id = ctx.request_id()))]
    pub async fn create_user(&self, ctx: &CorrelationContext, payload: &[u8]) -> Result<String, ServiceError> {
        self.gate.check()?;
        let new_user = NewUser::from_slice(payload).map_err(ServiceError::Validation)?;
        debug!(?new_user, "create_user called");

        let id = ctx.bound("persist user", self.persist(ctx, &new_user.name)).await??;
        info!(id = %id, "User created");

        let message = format!("created user {} with id {}", new_user.name, id);
        match publish_within_budget(&self.audit, ctx, self.audit_reserve, &id, &message).await {
            Ok(delivery) => debug!(partition = delivery.partition, offset = delivery.offset, "Audit event published"),
            Err(e @ ServiceError::RetryExhausted { .. }) => {
                warn!(kind = "audit_retry_exhausted", id = %id, error = %e, "Audit event not published")
            }
            Err(e) => warn!(kind = "audit_failed", id = %id, error = %e, "Audit event not published"),
        }

        match ctx.bound("provision order", self.orders.create_order(ctx, &id)).await? {
            Ok(()) => debug!(id = %id, "Order provisioned"),
            Err(e) => warn!(kind = "order_provisioning_failed", id = %id, error = %e, "Order provisioning failed"),
        }

        Ok(id)
    }

    /// Inserts the record under a freshly drawn id, drawing again while the
    /// store reports the id as taken.
    async fn persist(&self, ctx: &CorrelationContext, name: &str) -> Result<String, ServiceError> {
        for attempt in 1..=self.id_attempts {
            let candidate = self.ids.next_id();
            match self.store.insert_one(ctx, UserRecord::new(candidate, name)).await {
                Ok(id) => return Ok(id),
                Err(StoreError::DuplicateKey(taken)) => {
                    debug!(attempt, id = %taken, "User id taken, drawing another");
                }
                Err(e) => {
                    warn!(error = %e, "User not persisted");
                    return Err(e.into());
                }
            }
        }
        warn!(attempts = self.id_attempts, "No free user id");
        Err(ServiceError::IdAllocation(self.id_attempts))
    }
}
