//! # Generic Actor Server
//!
//! This module defines the `ResourceActor`, the component that owns a keyed
//! collection of entities. It implements the "Server" side of the Actor Model,
//! processing messages sequentially and ensuring exclusive access to the store.

use crate::client::ResourceClient;
use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use crate::message::ResourceRequest;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The generic actor that manages a collection of entities.
///
/// The actor owns the state (`store`) and the receiver end of the channel. Each
/// actor processes its own messages *sequentially*, so the store needs no `Mutex`
/// or `RwLock`: exclusive ownership within the task is the synchronization.
///
/// # Usage Pattern
///
/// 1.  **Create**: Call `ResourceActor::new()` to get the `actor` (server) and `client` (interface).
/// 2.  **Wire**: Pass dependencies into `actor.run(context)`.
/// 3.  **Run**: Spawn the actor's run loop in a background task.
///
/// ```rust
/// use actor_framework::{ActorEntity, ResourceActor};
/// use async_trait::async_trait;
/// use std::convert::Infallible;
///
/// #[derive(Clone, Debug)] struct Note { key: String, body: String }
/// #[derive(Debug, thiserror::Error)] #[error("note error")] struct NoteError;
///
/// #[async_trait]
/// impl ActorEntity for Note {
///     type Id = String;
///     type Action = Infallible;
///     type ActionResult = ();
///     type Context = ();
///     type Error = NoteError;
///
///     fn id(&self) -> String { self.key.clone() }
///     async fn handle_action(&mut self, action: Infallible, _: &()) -> Result<(), NoteError> {
///         match action {}
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let (actor, client) = ResourceActor::<Note>::new(10);
///     tokio::spawn(actor.run(()));
///
///     let key = client.insert(Note { key: "a".into(), body: "hi".into() }).await.unwrap();
///     assert_eq!(key, "a");
/// }
/// ```
///
/// # Operations
///
/// * **Insert**: rejects taken keys with [`FrameworkError::DuplicateKey`], runs
///   the `on_insert` hook, then stores the item.
/// * **Get**: returns a clone of the item if found, or `None`.
/// * **List**: returns clones of every item in insertion order.
/// * **Action**: runs `handle_action` on the stored item (mutable access).
/// * **Ping**: answers with the current collection size.
pub struct ResourceActor<T: ActorEntity> {
    receiver: mpsc::Receiver<ResourceRequest<T>>,
    store: HashMap<T::Id, T>,
    insertion_order: Vec<T::Id>,
}

impl<T: ActorEntity> ResourceActor<T> {
    /// Creates a new `ResourceActor` and its associated `ResourceClient`.
    ///
    /// `buffer_size` is the capacity of the MPSC channel. When the channel is
    /// full, calls on the client wait until there is space.
    pub fn new(buffer_size: usize) -> (Self, ResourceClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            store: HashMap::new(),
            insertion_order: Vec::new(),
        };
        let client = ResourceClient::new(sender);
        (actor, client)
    }

    /// Runs the actor's event loop, processing messages until every client is dropped.
    pub async fn run(mut self, context: T::Context) {
        let entity_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(entity_type, "Actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ResourceRequest::Insert {
                    mut item,
                    respond_to,
                } => {
                    let id = item.id();
                    debug!(entity_type, %id, "Insert");
                    if self.store.contains_key(&id) {
                        warn!(entity_type, %id, "Duplicate key");
                        let _ = respond_to.send(Err(FrameworkError::DuplicateKey(id.to_string())));
                        continue;
                    }
                    if let Err(e) = item.on_insert(&context).await {
                        warn!(entity_type, %id, error = %e, "on_insert failed");
                        let _ = respond_to.send(Err(FrameworkError::EntityError(Box::new(e))));
                        continue;
                    }
                    self.store.insert(id.clone(), item);
                    self.insertion_order.push(id.clone());
                    info!(entity_type, %id, size = self.store.len(), "Inserted");
                    let _ = respond_to.send(Ok(id));
                }
                ResourceRequest::Get { id, respond_to } => {
                    let item = self.store.get(&id).cloned();
                    debug!(entity_type, %id, found = item.is_some(), "Get");
                    let _ = respond_to.send(Ok(item));
                }
                ResourceRequest::List { respond_to } => {
                    let items: Vec<T> = self
                        .insertion_order
                        .iter()
                        .filter_map(|id| self.store.get(id).cloned())
                        .collect();
                    debug!(entity_type, count = items.len(), "List");
                    let _ = respond_to.send(Ok(items));
                }
                ResourceRequest::Action {
                    id,
                    action,
                    respond_to,
                } => {
                    debug!(entity_type, %id, ?action, "Action");
                    if let Some(item) = self.store.get_mut(&id) {
                        let result = item
                            .handle_action(action, &context)
                            .await
                            .map_err(|e| FrameworkError::EntityError(Box::new(e)));
                        match &result {
                            Ok(_) => debug!(entity_type, %id, "Action ok"),
                            Err(e) => warn!(entity_type, %id, error = %e, "Action failed"),
                        }
                        let _ = respond_to.send(result);
                    } else {
                        debug!(entity_type, %id, "Not found");
                        let _ = respond_to.send(Err(FrameworkError::NotFound(id.to_string())));
                    }
                }
                ResourceRequest::Ping { respond_to } => {
                    let _ = respond_to.send(Ok(self.store.len()));
                }
            }
        }

        info!(entity_type, size = self.store.len(), "Shutdown");
    }
}
