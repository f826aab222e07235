//! Error types surfaced by the orchestration layer.
//!
//! Capability errors (`StoreError`, `ProducerError`, `OrderServiceError`) stay
//! in their own modules and are folded into [`ServiceError`] here, at the
//! boundary where the orchestrators hand results back to the HTTP layer.

use crate::clients::OrderServiceError;
use crate::resources::producer::ProducerError;
use crate::resources::store::StoreError;
use crate::resources::ResourceKind;
use crate::retry::RetryError;
use thiserror::Error;

/// Errors returned by `UserWriter` and `UserReader`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or incomplete input. Never retried.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A backing resource could not serve the request.
    #[error("{resource} unavailable: {message}")]
    ResourceUnavailable {
        resource: ResourceKind,
        message: String,
    },

    /// All permitted attempts of a transient step failed.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        last_error: String,
    },

    /// The caller's deadline elapsed during the named step.
    #[error("deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),

    /// The order service failed a call the result depends on.
    #[error("order service degraded: {0}")]
    DownstreamDegraded(String),

    #[error("no user with id {0}")]
    NotFound(String),

    /// Every drawn id was already taken.
    #[error("could not allocate a free user id after {0} attempts")]
    IdAllocation(u32),

    #[error("service is shutting down")]
    ShuttingDown,
}

impl ServiceError {
    /// Short machine-readable label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::ResourceUnavailable { .. } => "resource_unavailable",
            ServiceError::RetryExhausted { .. } => "retry_exhausted",
            ServiceError::DeadlineExceeded(_) => "deadline_exceeded",
            ServiceError::DownstreamDegraded(_) => "downstream_degraded",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::IdAllocation(_) => "id_allocation",
            ServiceError::ShuttingDown => "shutting_down",
        }
    }

    fn store(message: impl ToString) -> Self {
        ServiceError::ResourceUnavailable {
            resource: ResourceKind::Store,
            message: message.to_string(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::store(other),
        }
    }
}

impl From<OrderServiceError> for ServiceError {
    fn from(e: OrderServiceError) -> Self {
        ServiceError::DownstreamDegraded(e.to_string())
    }
}

impl From<RetryError<ProducerError>> for ServiceError {
    fn from(e: RetryError<ProducerError>) -> Self {
        match e {
            RetryError::Permanent(inner) => ServiceError::ResourceUnavailable {
                resource: ResourceKind::Producer,
                message: inner.to_string(),
            },
            RetryError::Exhausted {
                attempts,
                last_error,
            } => ServiceError::RetryExhausted {
                operation: "publish audit event",
                attempts,
                last_error: last_error.to_string(),
            },
        }
    }
}
