//! # ActorEntity Trait
//!
//! The `ActorEntity` trait defines the contract every stored item (a user document,
//! a broker topic, ...) must implement to be managed by the generic `ResourceActor`.
//!
//! Unlike a counter-based registry, the collection never invents keys: the caller
//! builds the full item, the item reports its own key through [`ActorEntity::id`],
//! and the actor enforces that keys are unique.
//!
//! # Provided Methods (Hooks)
//! - [`ActorEntity::on_insert`]
//!
//! The default implementation does nothing (`Ok(())`).

use async_trait::async_trait;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait that any item must implement to be managed by ResourceActor.
///
/// # Async & Context
/// This trait is `#[async_trait]` to allow asynchronous operations in hooks. The
/// `Context` type is injected into every hook at `run()` time ("late binding").
#[async_trait]
pub trait ActorEntity: Clone + Send + Sync + 'static {
    /// The unique key for this item (e.g., a user id or a topic name).
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug;

    /// Enum representing item-specific operations (e.g., appending to a topic).
    /// Use [`std::convert::Infallible`] for items without actions.
    type Action: Send + Sync + Debug;

    /// The result type returned by custom actions.
    type ActionResult: Send + Sync + Debug;

    /// The runtime context (dependencies) injected into the actor.
    /// Use `()` if no dependencies are needed.
    type Context: Send + Sync;

    /// The error type for this item.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The key under which this item is indexed.
    fn id(&self) -> Self::Id;

    // --- Lifecycle Hooks (Async) ---

    /// Called right before the item enters the collection. Returning an error
    /// rejects the insert.
    async fn on_insert(&mut self, _ctx: &Self::Context) -> Result<(), Self::Error> {
        Ok(())
    }

    // --- Action Handler (Async) ---

    /// Handle a custom item-specific action.
    async fn handle_action(
        &mut self,
        action: Self::Action,
        ctx: &Self::Context,
    ) -> Result<Self::ActionResult, Self::Error>;
}
