//! # Actor Framework
//!
//! This crate provides the building blocks for keyed, write-once collections that
//! live inside a Tokio task. It implements a **Resource-Oriented Architecture (ROA)**
//! on top of the **Actor Model**: every collection is owned by exactly one actor and
//! is reached only through message passing.
//!
//! ## Why ROA + Actor Model?
//!
//! - Isolated state (no shared memory, no locks)
//! - A uniform request surface (`Insert`, `Get`, `List`, `Action`, `Ping`) for every
//!   item type
//! - Sequential processing within each actor eliminates race conditions, including
//!   the check-then-insert needed for a unique key index
//!
//! ## Core Components
//!
//! - [`ActorEntity`]: the contract an item implements (its key, hooks, actions).
//! - [`ResourceActor`]: the server half, owning the collection.
//! - [`ResourceClient`]: the cheap-to-clone client half.
//! - [`ActorClient`]: default read operations for domain-specific client wrappers.
//! - [`mock`]: expectation-driven clients for tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use actor_framework::{ActorEntity, ResourceActor};
//! use async_trait::async_trait;
//!
//! #[derive(Clone, Debug)]
//! struct Counter { name: String, value: u64 }
//!
//! #[derive(Debug)]
//! enum CounterAction { Increment }
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("counter error")]
//! struct CounterError;
//!
//! #[async_trait]
//! impl ActorEntity for Counter {
//!     type Id = String;
//!     type Action = CounterAction;
//!     type ActionResult = u64;
//!     type Context = ();
//!     type Error = CounterError;
//!
//!     fn id(&self) -> String { self.name.clone() }
//!
//!     async fn handle_action(&mut self, action: CounterAction, _: &()) -> Result<u64, CounterError> {
//!         match action {
//!             CounterAction::Increment => {
//!                 self.value += 1;
//!                 Ok(self.value)
//!             }
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, client) = ResourceActor::<Counter>::new(10);
//!     tokio::spawn(actor.run(()));
//!
//!     let id = client.insert(Counter { name: "hits".into(), value: 0 }).await.unwrap();
//!     let value = client.perform_action(id, CounterAction::Increment).await.unwrap();
//!     assert_eq!(value, 1);
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - Each actor runs in its own Tokio task
//! - Messages are processed **sequentially** within an actor
//! - Many clients may talk to one actor concurrently; the actor stops once every
//!   client has been dropped

pub mod actor;
pub mod client;
pub mod client_trait;
pub mod entity;
pub mod error;
pub mod message;
pub mod mock;

// Re-export core types for convenience
pub use actor::ResourceActor;
pub use client::ResourceClient;
pub use client_trait::ActorClient;
pub use entity::ActorEntity;
pub use error::FrameworkError;
pub use message::{ResourceRequest, Response};
