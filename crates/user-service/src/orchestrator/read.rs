use crate::audit::AuditEmitter;
use crate::clients::OrderService;
use crate::correlation::CorrelationContext;
use crate::error::ServiceError;
use crate::lifecycle::ShutdownGate;
use crate::model::UserRecord;
use crate::orchestrator::{publish_within_budget, require_id, DEFAULT_AUDIT_RESERVE};
use crate::resources::store::DocumentStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Serves user lookups.
#[derive(Clone)]
pub struct UserReader {
    store: Arc<dyn DocumentStore>,
    orders: Arc<dyn OrderService>,
    audit: AuditEmitter,
    gate: ShutdownGate,
    audit_reserve: Duration,
}

impl UserReader {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orders: Arc<dyn OrderService>,
        audit: AuditEmitter,
        gate: ShutdownGate,
    ) -> Self {
        Self {
            store,
            orders,
            audit,
            gate,
            audit_reserve: DEFAULT_AUDIT_RESERVE,
        }
    }

    pub fn with_audit_reserve(mut self, reserve: Duration) -> Self {
        self.audit_reserve = reserve;
        self
    }

    /// The user with `id` and its order from the order service.
    ///
    /// The order fetch and the store lookup run concurrently; if either fails
    /// the whole call fails and no partial record is returned.
    #[instrument(skip(self, ctx), fields(trace_id = ctx.trace_id(), request_id = ctx.request_id()))]
    pub async fn get_user_with_order(&self, ctx: &CorrelationContext, id: &str) -> Result<UserRecord, ServiceError> {
        self.gate.check()?;
        let id = require_id(id)?;
        self.announce(ctx, id, &format!("received request to get user by id {id}"))
            .await;

        let fetch_order = async { self.orders.get_order(ctx, id).await.map_err(ServiceError::from) };
        let find_user = async { self.store.find_one(ctx, id).await.map_err(ServiceError::from) };

        let (order, user) = ctx
            .bound("get user with order", async { tokio::try_join!(fetch_order, find_user) })
            .await??;
        debug!(id, "User aggregated with order");
        Ok(user.with_order(order))
    }

    #[instrument(skip(self, ctx), fields(trace_id = ctx.trace_id(), request_id = ctx.request_id()))]
    pub async fn get_user(&self, ctx: &CorrelationContext, id: &str) -> Result<UserRecord, ServiceError> {
        self.gate.check()?;
        let id = require_id(id)?;
        self.announce(ctx, id, &format!("received request to get user by id {id}"))
            .await;

        Ok(ctx.bound("find user", self.store.find_one(ctx, id)).await??)
    }

    #[instrument(skip(self, ctx), fields(trace_id = ctx.trace_id(), request_id = ctx.request_id()))]
    pub async fn list_users(&self, ctx: &CorrelationContext) -> Result<Vec<UserRecord>, ServiceError> {
        self.gate.check()?;
        self.announce(ctx, "users", "received request to get all users").await;

        Ok(ctx.bound("list users", self.store.find_all(ctx)).await??)
    }

    /// Best-effort audit event for a read; a failure never fails the read.
    async fn announce(&self, ctx: &CorrelationContext, key: &str, message: &str) {
        if let Err(e) = publish_within_budget(&self.audit, ctx, self.audit_reserve, key, message).await {
            warn!(kind = "audit_failed", key, error = %e, "Audit event not published");
        }
    }
}
