//! # ActorClient Trait
//!
//! Provides a common interface for domain‑specific clients, adding default `get`,
//! `list` and `ping` methods built on top of a generic `ResourceClient`.
use crate::{ActorEntity, FrameworkError, ResourceClient};
use async_trait::async_trait;

/// Trait for domain-specific clients to inherit the standard read operations.
///
/// # Example
///
/// ```rust
/// use actor_framework::{ActorClient, ActorEntity, FrameworkError, ResourceClient};
/// use async_trait::async_trait;
/// use std::convert::Infallible;
///
/// #[derive(Clone, Debug)] struct Note { key: u32 }
/// #[derive(Debug, thiserror::Error)] #[error("{0}")] struct NoteError(String);
///
/// #[async_trait]
/// impl ActorEntity for Note {
///     type Id = u32;
///     type Action = Infallible;
///     type ActionResult = ();
///     type Context = ();
///     type Error = NoteError;
///     fn id(&self) -> u32 { self.key }
///     async fn handle_action(&mut self, action: Infallible, _: &()) -> Result<(), NoteError> {
///         match action {}
///     }
/// }
///
/// struct Notes { inner: ResourceClient<Note> }
///
/// #[async_trait]
/// impl ActorClient<Note> for Notes {
///     type Error = NoteError;
///     fn inner(&self) -> &ResourceClient<Note> { &self.inner }
///     fn map_error(e: FrameworkError) -> NoteError { NoteError(e.to_string()) }
/// }
///
/// async fn usage(notes: Notes) {
///     // get(), list() and ping() are provided automatically.
///     let _ = notes.get(1).await;
///     let _ = notes.list().await;
/// }
/// ```
#[async_trait]
pub trait ActorClient<T: ActorEntity>: Send + Sync {
    /// The domain-specific error type.
    type Error: Send + Sync;

    /// Access the inner generic ResourceClient.
    fn inner(&self) -> &ResourceClient<T>;

    /// Map framework errors to the domain error type.
    fn map_error(e: FrameworkError) -> Self::Error;

    /// Fetch an entity by key.
    #[tracing::instrument(skip(self))]
    async fn get(&self, id: T::Id) -> Result<Option<T>, Self::Error> {
        tracing::debug!("Sending request");
        self.inner().get(id).await.map_err(Self::map_error)
    }

    /// Fetch every entity in insertion order.
    #[tracing::instrument(skip(self))]
    async fn list(&self) -> Result<Vec<T>, Self::Error> {
        tracing::debug!("Sending request");
        self.inner().list().await.map_err(Self::map_error)
    }

    /// Liveness round trip; returns the collection size.
    async fn ping(&self) -> Result<usize, Self::Error> {
        self.inner().ping().await.map_err(Self::map_error)
    }
}
