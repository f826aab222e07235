//! # Generic Messages
//!
//! This module defines the generic message types used for communication between
//! the `ResourceClient` and `ResourceActor`.

use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by actors.
pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

/// Internal message type sent to the actor to request operations.
///
/// The variants cover the lifecycle of a write-once collection:
///
/// - **Insert**: adds a fully built item. Rejected with `DuplicateKey` when the
///   key is taken.
/// - **Get**: fetches one item by key.
/// - **List**: returns every item in insertion order.
/// - **Action**: runs a custom [`ActorEntity::Action`] against one item.
/// - **Ping**: a round trip through the actor's queue, answered with the
///   collection size. Used as a liveness probe.
#[derive(Debug)]
pub enum ResourceRequest<T: ActorEntity> {
    Insert {
        item: T,
        respond_to: Response<T::Id>,
    },
    Get {
        id: T::Id,
        respond_to: Response<Option<T>>,
    },
    List {
        respond_to: Response<Vec<T>>,
    },
    Action {
        id: T::Id,
        action: T::Action,
        respond_to: Response<T::ActionResult>,
    },
    Ping {
        respond_to: Response<usize>,
    },
}
