//! # Event Stream Producer
//!
//! Audit events are written through the [`EventProducer`] capability.
//! [`EmbeddedEventStream`] implements it with a broker actor holding
//! [`Topic`]s, each split into partitions. A message is routed to a partition
//! by hashing its key, so messages with one key stay ordered.
//!
//! Like a freshly started broker with auto topic creation, the first write to
//! an unknown topic creates it and is answered with
//! [`ProducerError::LeaderNotAvailable`]. That error is transient: the retry
//! policy backs off and the next attempt lands. The health probe exercises this
//! path with a short warm-up publish, so a producer that passed startup has
//! already written through the same code the audit emitter uses.

use crate::correlation::CorrelationContext;
use crate::resources::{require_readable, ResourceError, ResourceHandle, ResourceKind};
use crate::retry::{RetryPolicy, Transient};
use actor_framework::{ActorEntity, FrameworkError, ResourceActor, ResourceClient};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

/// Messages published by the health probe before the producer is reported ready.
const WARMUP_MESSAGES: [(&str, &str); 3] = [("Key-A", "Hello World!"), ("Key-B", "One!"), ("Key-C", "Two!")];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProducerError {
    #[error("event stream is not connected")]
    NotConnected,

    #[error("event stream connection is closed")]
    Closed,

    #[error("leader not available for topic {0}")]
    LeaderNotAvailable(String),

    #[error("event stream write timed out")]
    Timeout,

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("invalid event stream configuration: {0}")]
    Config(String),
}

impl Transient for ProducerError {
    fn is_transient(&self) -> bool {
        matches!(self, ProducerError::LeaderNotAvailable(_) | ProducerError::Timeout)
    }
}

impl From<Elapsed> for ProducerError {
    fn from(_: Elapsed) -> Self {
        ProducerError::Timeout
    }
}

impl From<FrameworkError> for ProducerError {
    fn from(e: FrameworkError) -> Self {
        match e {
            FrameworkError::ActorClosed | FrameworkError::ActorDropped => ProducerError::Closed,
            FrameworkError::NotFound(topic) => ProducerError::LeaderNotAvailable(topic),
            FrameworkError::DuplicateKey(topic) => {
                ProducerError::Rejected(format!("topic {topic} already exists"))
            }
            FrameworkError::EntityError(e) => ProducerError::Rejected(e.to_string()),
        }
    }
}

/// Where a message landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub key: String,
    pub value: String,
    pub headers: Vec<(String, String)>,
}

impl EventMessage {
    /// A message carrying the context's correlation headers.
    pub fn new(ctx: &CorrelationContext, key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            headers: ctx
                .headers()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub partition: u32,
    pub offset: u64,
    pub message: EventMessage,
}

#[async_trait]
pub trait EventProducer: Send + Sync {
    /// Writes one message to the configured topic, routed by `key`.
    async fn write_message(&self, ctx: &CorrelationContext, key: &str, value: &str) -> Result<Delivery, ProducerError>;
}

// --- Entity ---

/// A topic: an append-only log per partition.
#[derive(Debug, Clone)]
pub struct Topic {
    name: String,
    partitions: Vec<Vec<EventMessage>>,
}

#[derive(Debug)]
pub enum TopicAction {
    Append(EventMessage),
    Snapshot,
}

#[derive(Debug)]
pub enum TopicReply {
    Appended { partition: u32, offset: u64 },
    Messages(Vec<StoredMessage>),
}

impl Topic {
    pub fn new(name: impl Into<String>, partitions: u32) -> Self {
        Self {
            name: name.into(),
            partitions: vec![Vec::new(); partitions.max(1) as usize],
        }
    }

    pub fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    /// Hash balancer: FNV-1a of the key modulo the partition count.
    pub fn partition_for(&self, key: &str) -> u32 {
        let hash = key
            .bytes()
            .fold(0x811c_9dc5_u32, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193));
        hash % self.partition_count()
    }
}

#[async_trait]
impl ActorEntity for Topic {
    type Id = String;
    type Action = TopicAction;
    type ActionResult = TopicReply;
    type Context = ();
    type Error = ProducerError;

    fn id(&self) -> String {
        self.name.clone()
    }

    async fn on_insert(&mut self, _ctx: &()) -> Result<(), ProducerError> {
        if self.name.trim().is_empty() {
            return Err(ProducerError::Rejected("topic name must not be blank".to_string()));
        }
        Ok(())
    }

    async fn handle_action(&mut self, action: TopicAction, _ctx: &()) -> Result<TopicReply, ProducerError> {
        match action {
            TopicAction::Append(message) => {
                let partition = self.partition_for(&message.key);
                let log = &mut self.partitions[partition as usize];
                log.push(message);
                Ok(TopicReply::Appended {
                    partition,
                    offset: (log.len() - 1) as u64,
                })
            }
            TopicAction::Snapshot => {
                let messages = self
                    .partitions
                    .iter()
                    .enumerate()
                    .flat_map(|(partition, log)| {
                        log.iter().enumerate().map(move |(offset, message)| StoredMessage {
                            partition: partition as u32,
                            offset: offset as u64,
                            message: message.clone(),
                        })
                    })
                    .collect();
                Ok(TopicReply::Messages(messages))
            }
        }
    }
}

// --- Handle ---

#[derive(Debug, Clone)]
pub struct EventStreamSettings {
    pub brokers: Vec<String>,
    pub topic: String,
    /// Partition count used when the topic is auto-created.
    pub partitions: u32,
    pub secured: bool,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub write_timeout: Duration,
    /// Retry policy for the warm-up publish run by the health probe.
    pub warmup: RetryPolicy,
    pub buffer: usize,
}

impl EventStreamSettings {
    /// Development settings: `localhost:9092`, topic `demoTopic`, no TLS.
    pub fn embedded() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "demoTopic".to_string(),
            partitions: 3,
            secured: false,
            client_cert: None,
            client_key: None,
            write_timeout: Duration::from_secs(10),
            warmup: RetryPolicy::default(),
            buffer: 64,
        }
    }

    fn validate(&self) -> Result<(), ProducerError> {
        if self.brokers.is_empty() {
            return Err(ProducerError::Config("at least one broker is required".to_string()));
        }
        for broker in &self.brokers {
            let valid = broker
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(ProducerError::Config(format!("broker address {broker:?} is not host:port")));
            }
        }
        if self.topic.trim().is_empty() {
            return Err(ProducerError::Config("topic must not be blank".to_string()));
        }
        if self.partitions == 0 {
            return Err(ProducerError::Config("partition count must be positive".to_string()));
        }
        Ok(())
    }
}

enum Connection {
    Idle,
    Open {
        broker: ResourceClient<Topic>,
        task: JoinHandle<()>,
    },
    Closed,
}

/// In-process partitioned event stream.
pub struct EmbeddedEventStream {
    settings: EventStreamSettings,
    connection: RwLock<Connection>,
}

impl EmbeddedEventStream {
    pub fn new(settings: EventStreamSettings) -> Self {
        Self {
            settings,
            connection: RwLock::new(Connection::Idle),
        }
    }

    pub fn settings(&self) -> &EventStreamSettings {
        &self.settings
    }

    async fn broker(&self) -> Result<ResourceClient<Topic>, ProducerError> {
        match &*self.connection.read().await {
            Connection::Open { broker, .. } => Ok(broker.clone()),
            Connection::Idle => Err(ProducerError::NotConnected),
            Connection::Closed => Err(ProducerError::Closed),
        }
    }

    /// Appends `message` to the configured topic.
    ///
    /// An unknown topic is created and the write answered with
    /// `LeaderNotAvailable`; the caller is expected to retry.
    pub async fn publish(&self, message: EventMessage) -> Result<Delivery, ProducerError> {
        let broker = self.broker().await?;
        let topic = self.settings.topic.clone();

        let reply = tokio::time::timeout(
            self.settings.write_timeout,
            broker.perform_action(topic.clone(), TopicAction::Append(message)),
        )
        .await?;

        match reply {
            Ok(TopicReply::Appended { partition, offset }) => Ok(Delivery {
                topic,
                partition,
                offset,
            }),
            Ok(TopicReply::Messages(_)) => Err(ProducerError::Rejected("unexpected broker reply".to_string())),
            Err(FrameworkError::NotFound(_)) => {
                match broker
                    .insert(Topic::new(topic.clone(), self.settings.partitions))
                    .await
                {
                    Ok(_) => info!(topic = %topic, partitions = self.settings.partitions, "Topic created"),
                    // Another writer created it first.
                    Err(FrameworkError::DuplicateKey(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                Err(ProducerError::LeaderNotAvailable(topic))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every message currently stored in the configured topic, by partition then offset.
    pub async fn messages(&self) -> Result<Vec<StoredMessage>, ProducerError> {
        let broker = self.broker().await?;
        match broker
            .perform_action(self.settings.topic.clone(), TopicAction::Snapshot)
            .await
        {
            Ok(TopicReply::Messages(messages)) => Ok(messages),
            Ok(TopicReply::Appended { .. }) => Err(ProducerError::Rejected("unexpected broker reply".to_string())),
            Err(FrameworkError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn verify_credentials(&self) -> Result<(), ProducerError> {
        if !self.settings.secured {
            return Ok(());
        }
        require_readable(self.settings.client_cert.as_deref(), "client certificate")
            .await
            .map_err(ProducerError::Config)?;
        require_readable(self.settings.client_key.as_deref(), "client key")
            .await
            .map_err(ProducerError::Config)
    }
}

#[async_trait]
impl ResourceHandle for EmbeddedEventStream {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Producer
    }

    fn name(&self) -> String {
        format!("{}/{}", self.settings.brokers.join(","), self.settings.topic)
    }

    async fn connect(&self) -> Result<(), ResourceError> {
        let mut connection = self.connection.write().await;
        match &*connection {
            Connection::Open { .. } => return Ok(()),
            Connection::Closed => return Err(ProducerError::Closed.into()),
            Connection::Idle => {}
        }

        self.settings.validate()?;
        self.verify_credentials().await?;

        let (actor, broker) = ResourceActor::<Topic>::new(self.settings.buffer.max(1));
        let task = tokio::spawn(actor.run(()));
        *connection = Connection::Open { broker, task };
        info!(
            brokers = ?self.settings.brokers,
            topic = %self.settings.topic,
            secured = self.settings.secured,
            "Event stream connected"
        );
        Ok(())
    }

    async fn health_probe(&self) -> Result<(), ResourceError> {
        let ctx = CorrelationContext::new_root();
        for (key, value) in WARMUP_MESSAGES {
            let delivery = self
                .settings
                .warmup
                .run("warm-up publish", |_| self.publish(EventMessage::new(&ctx, key, value)))
                .await?;
            debug!(key, partition = delivery.partition, offset = delivery.offset, "Warm-up message delivered");
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ResourceError> {
        let previous = {
            let mut connection = self.connection.write().await;
            std::mem::replace(&mut *connection, Connection::Closed)
        };

        let Connection::Open { broker, task } = previous else {
            return Ok(());
        };
        drop(broker);
        if let Err(e) = task.await {
            warn!(error = %e, "Event stream task ended abnormally");
            return Err(ProducerError::Rejected(e.to_string()).into());
        }
        info!(topic = %self.settings.topic, "Event stream closed");
        Ok(())
    }
}

#[async_trait]
impl EventProducer for EmbeddedEventStream {
    async fn write_message(&self, ctx: &CorrelationContext, key: &str, value: &str) -> Result<Delivery, ProducerError> {
        debug!(trace_id = ctx.trace_id(), key, "write_message");
        self.publish(EventMessage::new(ctx, key, value)).await
    }
}
