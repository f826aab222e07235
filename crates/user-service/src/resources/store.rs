//! # Document Store
//!
//! The orchestrators persist and look up [`UserRecord`]s through the
//! [`DocumentStore`] capability. [`EmbeddedDocumentStore`] implements it on top
//! of a [`ResourceActor<UserRecord>`]: the actor owns the collection, and its
//! unique key index rejects a second record with an id that is already taken.
//!
//! The handle starts idle. `connect` spawns the actor, `close` drops the last
//! client and waits for the actor task to finish; after that every call fails
//! with [`StoreError::Closed`].

use crate::correlation::CorrelationContext;
use crate::model::UserRecord;
use crate::resources::{require_readable, ResourceError, ResourceHandle, ResourceKind};
use actor_framework::{ActorClient, ActorEntity, FrameworkError, ResourceActor, ResourceClient};
use async_trait::async_trait;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("document store is not connected")]
    NotConnected,

    #[error("document store connection is closed")]
    Closed,

    #[error("duplicate key: user id {0} already exists")]
    DuplicateKey(String),

    #[error("no user matches id {0}")]
    NotFound(String),

    #[error("document rejected: {0}")]
    Rejected(String),

    #[error("document store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid document store configuration: {0}")]
    Config(String),

    #[error("document store failure: {0}")]
    Backend(String),
}

impl From<FrameworkError> for StoreError {
    fn from(e: FrameworkError) -> Self {
        match e {
            FrameworkError::ActorClosed | FrameworkError::ActorDropped => StoreError::Closed,
            FrameworkError::DuplicateKey(id) => StoreError::DuplicateKey(id),
            FrameworkError::NotFound(id) => StoreError::NotFound(id),
            FrameworkError::EntityError(e) => StoreError::Rejected(e.to_string()),
        }
    }
}

/// Capability used by the orchestrators. Connection management lives on
/// [`ResourceHandle`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a record; fails with [`StoreError::DuplicateKey`] when the id is taken.
    async fn insert_one(&self, ctx: &CorrelationContext, record: UserRecord) -> Result<String, StoreError>;

    /// Finds a record by id; fails with [`StoreError::NotFound`] when absent.
    async fn find_one(&self, ctx: &CorrelationContext, id: &str) -> Result<UserRecord, StoreError>;

    /// Returns every record in insertion order.
    async fn find_all(&self, ctx: &CorrelationContext) -> Result<Vec<UserRecord>, StoreError>;
}

// --- Entity ---

#[async_trait]
impl ActorEntity for UserRecord {
    type Id = String;
    type Action = Infallible;
    type ActionResult = ();
    type Context = ();
    type Error = StoreError;

    fn id(&self) -> String {
        self.id.clone()
    }

    async fn on_insert(&mut self, _ctx: &()) -> Result<(), StoreError> {
        if self.id.trim().is_empty() {
            return Err(StoreError::Rejected("user id must not be blank".to_string()));
        }
        // Aggregated order data is never persisted.
        self.order = None;
        Ok(())
    }

    async fn handle_action(&mut self, action: Infallible, _ctx: &()) -> Result<(), StoreError> {
        match action {}
    }
}

/// Client for the user collection actor.
#[derive(Clone)]
pub struct UserCollection {
    inner: ResourceClient<UserRecord>,
}

impl UserCollection {
    pub fn new(inner: ResourceClient<UserRecord>) -> Self {
        Self { inner }
    }

    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn insert_user(&self, record: UserRecord) -> Result<String, StoreError> {
        debug!("Sending request");
        self.inner.insert(record).await.map_err(StoreError::from)
    }
}

#[async_trait]
impl ActorClient<UserRecord> for UserCollection {
    type Error = StoreError;

    fn inner(&self) -> &ResourceClient<UserRecord> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> StoreError {
        e.into()
    }
}

// --- Handle ---

#[derive(Clone)]
pub struct StoreSettings {
    pub database: String,
    pub collection: String,
    pub username: String,
    pub password: String,
    /// Secured mode requires TLS material to be present at connect time.
    pub secured: bool,
    pub ca_cert: Option<PathBuf>,
    pub client_cert_key: Option<PathBuf>,
    pub operation_timeout: Duration,
    pub buffer: usize,
}

impl StoreSettings {
    /// Development settings: `demo.users`, no TLS.
    pub fn embedded() -> Self {
        Self {
            database: "demo".to_string(),
            collection: "users".to_string(),
            username: "root".to_string(),
            password: String::new(),
            secured: false,
            ca_cert: None,
            client_cert_key: None,
            operation_timeout: Duration::from_secs(30),
            buffer: 64,
        }
    }

    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("secured", &self.secured)
            .field("ca_cert", &self.ca_cert)
            .field("client_cert_key", &self.client_cert_key)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

enum Connection {
    Idle,
    Open {
        collection: UserCollection,
        task: Option<JoinHandle<()>>,
    },
    Closed,
}

/// In-process document store backed by a `ResourceActor<UserRecord>`.
pub struct EmbeddedDocumentStore {
    settings: StoreSettings,
    connection: RwLock<Connection>,
}

impl EmbeddedDocumentStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            settings,
            connection: RwLock::new(Connection::Idle),
        }
    }

    /// A store that is already open on `collection` (e.g. a mock client).
    pub fn attached(settings: StoreSettings, collection: UserCollection) -> Self {
        Self {
            settings,
            connection: RwLock::new(Connection::Open {
                collection,
                task: None,
            }),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    async fn collection(&self) -> Result<UserCollection, StoreError> {
        match &*self.connection.read().await {
            Connection::Open { collection, .. } => Ok(collection.clone()),
            Connection::Idle => Err(StoreError::NotConnected),
            Connection::Closed => Err(StoreError::Closed),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let limit = self.settings.operation_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }

    async fn verify_credentials(&self) -> Result<(), StoreError> {
        if !self.settings.secured {
            return Ok(());
        }
        if self.settings.username.trim().is_empty() {
            return Err(StoreError::Config("username is required in secured mode".to_string()));
        }
        require_readable(self.settings.ca_cert.as_deref(), "CA certificate")
            .await
            .map_err(StoreError::Config)?;
        require_readable(self.settings.client_cert_key.as_deref(), "client certificate key")
            .await
            .map_err(StoreError::Config)
    }
}

#[async_trait]
impl ResourceHandle for EmbeddedDocumentStore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Store
    }

    fn name(&self) -> String {
        self.settings.namespace()
    }

    async fn connect(&self) -> Result<(), ResourceError> {
        let mut connection = self.connection.write().await;
        match &*connection {
            Connection::Open { .. } => return Ok(()),
            Connection::Closed => return Err(StoreError::Closed.into()),
            Connection::Idle => {}
        }

        self.verify_credentials().await?;

        let (actor, client) = ResourceActor::<UserRecord>::new(self.settings.buffer.max(1));
        let task = tokio::spawn(actor.run(()));
        *connection = Connection::Open {
            collection: UserCollection::new(client),
            task: Some(task),
        };
        info!(
            namespace = %self.settings.namespace(),
            secured = self.settings.secured,
            "Document store connected"
        );
        Ok(())
    }

    async fn health_probe(&self) -> Result<(), ResourceError> {
        let collection = self.collection().await?;
        let size = self.bounded(collection.ping()).await?;
        debug!(namespace = %self.settings.namespace(), size, "Document store ping ok");
        Ok(())
    }

    async fn close(&self) -> Result<(), ResourceError> {
        let previous = {
            let mut connection = self.connection.write().await;
            std::mem::replace(&mut *connection, Connection::Closed)
        };

        let Connection::Open { collection, task } = previous else {
            return Ok(());
        };
        // The actor stops once the last client clone is gone; in-flight calls
        // still hold theirs until they complete.
        drop(collection);
        if let Some(task) = task {
            task.await.map_err(|e| {
                warn!(error = %e, "Document store task ended abnormally");
                StoreError::Backend(e.to_string())
            })?;
        }
        info!(namespace = %self.settings.namespace(), "Document store disconnected");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for EmbeddedDocumentStore {
    async fn insert_one(&self, ctx: &CorrelationContext, record: UserRecord) -> Result<String, StoreError> {
        debug!(trace_id = ctx.trace_id(), id = %record.id, "insert_one");
        let collection = self.collection().await?;
        self.bounded(collection.insert_user(record)).await
    }

    async fn find_one(&self, ctx: &CorrelationContext, id: &str) -> Result<UserRecord, StoreError> {
        debug!(trace_id = ctx.trace_id(), id, "find_one");
        let collection = self.collection().await?;
        self.bounded(collection.get(id.to_string()))
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_all(&self, ctx: &CorrelationContext) -> Result<Vec<UserRecord>, StoreError> {
        debug!(trace_id = ctx.trace_id(), "find_all");
        let collection = self.collection().await?;
        self.bounded(collection.list()).await
    }
}
