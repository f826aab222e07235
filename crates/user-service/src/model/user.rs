use serde::{Deserialize, Serialize};

/// A stored user document.
///
/// # Actor Framework
/// Implements [`ActorEntity`](actor_framework::ActorEntity) (see
/// `resources::store`), so the embedded document store keeps these in a
/// [`ResourceActor`](actor_framework::ResourceActor) keyed by `id`.
///
/// The `id` is assigned exactly once by the service when the record is
/// created. `order` is only filled in on the aggregated read path and is never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<serde_json::Value>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order: None,
        }
    }

    pub fn with_order(mut self, order: serde_json::Value) -> Self {
        self.order = Some(order);
        self
    }
}

/// Payload accepted by `POST /user`.
///
/// Unknown fields are ignored, including a client supplied `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
}

impl NewUser {
    /// Decodes and validates a raw request body.
    pub fn from_slice(payload: &[u8]) -> Result<Self, String> {
        let user: NewUser =
            serde_json::from_slice(payload).map_err(|e| format!("malformed user payload: {e}"))?;
        if user.name.trim().is_empty() {
            return Err("user name must not be blank".to_string());
        }
        Ok(user)
    }
}

/// Body returned by `POST /user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedUser {
    pub id: String,
}
