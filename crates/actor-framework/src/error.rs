//! # Framework Errors
//!
//! This module defines the common error types used throughout the actor framework.
//! Collection-level failures (closed channel, missing key, unique-index violation)
//! live here; entity-specific failures are boxed into [`FrameworkError::EntityError`].

/// Errors that can occur within the actor framework itself.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
    #[error("Item not found: {0}")]
    NotFound(String),
    /// An item with the same key is already stored. The collection keeps a
    /// unique index on `ActorEntity::Id`.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Entity error: {0}")]
    EntityError(Box<dyn std::error::Error + Send + Sync>),
}
