#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use user_service::clients::{OrderService, OrderServiceError};
use user_service::correlation::CorrelationContext;
use user_service::orchestrator::IdSource;
use user_service::resources::producer::{Delivery, EventProducer, ProducerError};
use user_service::resources::{ResourceError, ResourceHandle, ResourceKind};
use user_service::retry::RetryPolicy;

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        per_attempt_timeout: Duration::from_millis(200),
        backoff: Duration::from_millis(5),
    }
}

// --- Event producer ---

/// Records every write; fails each one with `failure` when set.
#[derive(Default)]
pub struct RecordingProducer {
    failure: Mutex<Option<ProducerError>>,
    messages: Mutex<Vec<(String, String)>>,
    attempts: AtomicU32,
}

impl RecordingProducer {
    pub fn failing(error: ProducerError) -> Self {
        Self {
            failure: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventProducer for RecordingProducer {
    async fn write_message(&self, _ctx: &CorrelationContext, key: &str, value: &str) -> Result<Delivery, ProducerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.failure.lock().unwrap().clone() {
            return Err(e);
        }
        let mut messages = self.messages.lock().unwrap();
        messages.push((key.to_string(), value.to_string()));
        Ok(Delivery {
            topic: "demoTopic".to_string(),
            partition: 0,
            offset: (messages.len() - 1) as u64,
        })
    }
}

/// Accepts every write and never answers.
#[derive(Default)]
pub struct HangingProducer {
    attempts: AtomicU32,
}

impl HangingProducer {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventProducer for HangingProducer {
    async fn write_message(&self, _ctx: &CorrelationContext, _key: &str, _value: &str) -> Result<Delivery, ProducerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

// --- Order service ---

#[derive(Default)]
pub struct FakeOrders {
    pub order: Mutex<Option<serde_json::Value>>,
    pub create_fails: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    created: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeOrders {
    pub fn with_order(order: serde_json::Value) -> Self {
        Self {
            order: Mutex::new(Some(order)),
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderService for FakeOrders {
    async fn get_order(&self, _ctx: &CorrelationContext, user_id: &str) -> Result<serde_json::Value, OrderServiceError> {
        self.fetched.lock().unwrap().push(user_id.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.order.lock().unwrap().clone().ok_or(OrderServiceError::Status {
            status: 503,
            body: "order service down".to_string(),
        })
    }

    async fn create_order(&self, _ctx: &CorrelationContext, user_id: &str) -> Result<(), OrderServiceError> {
        self.created.lock().unwrap().push(user_id.to_string());
        if self.create_fails.load(Ordering::SeqCst) {
            return Err(OrderServiceError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

// --- Ids ---

/// Hands out the queued ids in order, then repeats the last one.
pub struct ScriptedIds {
    ids: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl ScriptedIds {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
            last: Mutex::new(ids.last().copied().unwrap_or("0").to_string()),
        }
    }
}

impl IdSource for ScriptedIds {
    fn next_id(&self) -> String {
        match self.ids.lock().unwrap().pop_front() {
            Some(id) => {
                *self.last.lock().unwrap() = id.clone();
                id
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

// --- Resource handle ---

#[derive(Default)]
pub struct FakeHandleBehavior {
    pub fail_connect: bool,
    pub fail_probe: bool,
    pub fail_close: bool,
    pub hang_close: bool,
    pub slow_probe: Option<Duration>,
}

pub struct FakeHandle {
    kind: ResourceKind,
    behavior: FakeHandleBehavior,
    open: AtomicBool,
    connects: AtomicU32,
    probes: AtomicU32,
    closes: AtomicU32,
}

impl FakeHandle {
    pub fn new(kind: ResourceKind, behavior: FakeHandleBehavior) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behavior,
            open: AtomicBool::new(false),
            connects: AtomicU32::new(0),
            probes: AtomicU32::new(0),
            closes: AtomicU32::new(0),
        })
    }

    pub fn healthy(kind: ResourceKind) -> Arc<Self> {
        Self::new(kind, FakeHandleBehavior::default())
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

fn fake_error(what: &str) -> ResourceError {
    ResourceError::Producer(ProducerError::Rejected(what.to_string()))
}

#[async_trait]
impl ResourceHandle for FakeHandle {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn name(&self) -> String {
        format!("fake-{}", self.kind)
    }

    async fn connect(&self) -> Result<(), ResourceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_connect {
            return Err(fake_error("connect refused"));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn health_probe(&self) -> Result<(), ResourceError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.behavior.slow_probe {
            tokio::time::sleep(delay).await;
        }
        if self.behavior.fail_probe {
            return Err(fake_error("probe failed"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ResourceError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.behavior.hang_close {
            std::future::pending::<()>().await;
        }
        self.open.store(false, Ordering::SeqCst);
        if self.behavior.fail_close {
            return Err(fake_error("close failed"));
        }
        Ok(())
    }
}
