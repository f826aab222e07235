//! # Mock Framework & Testing Guide
//!
//! The `MockClient<T>` type hands out a real `ResourceClient<T>` whose requests are
//! answered from a queue of expectations instead of a running actor. It lets you
//! inject failures that are hard to reproduce with a real collection (a vanished
//! actor, a unique-index violation) and verify what the code under test sent.
//!
//! | Feature | MockClient | Real Actor |
//! |---------|------------|------------|
//! | **Determinism** | 100% Deterministic | Subject to scheduler |
//! | **State** | No real state (expectations) | Real state management |
//! | **Error Injection** | Easy (`return_err`) | Hard (requires specific state) |
//!
//! ```rust
//! use actor_framework::mock::MockClient;
//! use actor_framework::{ActorEntity, FrameworkError};
//! use async_trait::async_trait;
//! use std::convert::Infallible;
//!
//! #[derive(Clone, Debug)] struct Note { key: u32 }
//! #[derive(Debug, thiserror::Error)] #[error("note error")] struct NoteError;
//!
//! #[async_trait]
//! impl ActorEntity for Note {
//!     type Id = u32; type Action = Infallible; type ActionResult = ();
//!     type Context = (); type Error = NoteError;
//!     fn id(&self) -> u32 { self.key }
//!     async fn handle_action(&mut self, a: Infallible, _: &()) -> Result<(), NoteError> { match a {} }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut mock = MockClient::<Note>::new();
//!     mock.expect_insert().return_err(FrameworkError::DuplicateKey("1".into()));
//!
//!     let result = mock.client().insert(Note { key: 1 }).await;
//!     assert!(matches!(result, Err(FrameworkError::DuplicateKey(_))));
//!     mock.verify();
//! }
//! ```
//!
//! Use [`closed_client`] for a client whose actor is already gone.

use crate::client::ResourceClient;
use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use crate::message::ResourceRequest;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Represents an expected request to the mock client.
enum Expectation<T: ActorEntity> {
    Insert {
        response: Result<T::Id, FrameworkError>,
    },
    Get {
        id: T::Id,
        response: Result<Option<T>, FrameworkError>,
    },
    List {
        response: Result<Vec<T>, FrameworkError>,
    },
    Action {
        id: T::Id,
        response: Result<T::ActionResult, FrameworkError>,
    },
    Ping {
        response: Result<usize, FrameworkError>,
    },
}

type Queue<T> = Arc<Mutex<VecDeque<Expectation<T>>>>;

/// A mock client with expectation tracking for fluent testing.
///
/// Requests are matched against expectations in FIFO order. A request that does
/// not match the next expectation (or arrives with none queued) is answered
/// with [`FrameworkError::ActorDropped`] and counted as a mismatch, which makes
/// [`MockClient::verify`] fail.
pub struct MockClient<T: ActorEntity> {
    client: ResourceClient<T>,
    expectations: Queue<T>,
    inserted: Arc<Mutex<Vec<T>>>,
    mismatches: Arc<Mutex<Vec<String>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<T: ActorEntity> Default for MockClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ActorEntity> MockClient<T> {
    /// Creates a new mock client with no expectations.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<ResourceRequest<T>>(100);
        let expectations: Queue<T> = Arc::new(Mutex::new(VecDeque::new()));
        let inserted = Arc::new(Mutex::new(Vec::new()));
        let mismatches = Arc::new(Mutex::new(Vec::new()));

        let queue = expectations.clone();
        let seen = inserted.clone();
        let wrong = mismatches.clone();
        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let expectation = queue.lock().unwrap().pop_front();

                match (request, expectation) {
                    (ResourceRequest::Insert { item, respond_to }, Some(Expectation::Insert { response })) => {
                        seen.lock().unwrap().push(item);
                        let _ = respond_to.send(response);
                    }
                    (ResourceRequest::Get { id, respond_to }, Some(Expectation::Get { id: expected, response })) => {
                        if id != expected {
                            wrong.lock().unwrap().push(format!("get {id}, expected {expected}"));
                        }
                        let _ = respond_to.send(response);
                    }
                    (ResourceRequest::List { respond_to }, Some(Expectation::List { response })) => {
                        let _ = respond_to.send(response);
                    }
                    (
                        ResourceRequest::Action { id, respond_to, .. },
                        Some(Expectation::Action { id: expected, response }),
                    ) => {
                        if id != expected {
                            wrong.lock().unwrap().push(format!("action on {id}, expected {expected}"));
                        }
                        let _ = respond_to.send(response);
                    }
                    (ResourceRequest::Ping { respond_to }, Some(Expectation::Ping { response })) => {
                        let _ = respond_to.send(response);
                    }
                    (request, _) => {
                        wrong
                            .lock()
                            .unwrap()
                            .push(format!("unexpected request: {}", describe(&request)));
                        reject(request);
                    }
                }
            }
        });

        Self {
            client: ResourceClient::new(sender),
            expectations,
            inserted,
            mismatches,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> ResourceClient<T> {
        self.client.clone()
    }

    /// Expects an `insert` operation.
    pub fn expect_insert(&mut self) -> ExpectationBuilder<T, T::Id> {
        ExpectationBuilder::new(self.expectations.clone(), |response| Expectation::Insert { response })
    }

    /// Expects a `get` operation for `id`.
    pub fn expect_get(&mut self, id: T::Id) -> ExpectationBuilder<T, Option<T>> {
        ExpectationBuilder::new(self.expectations.clone(), move |response| Expectation::Get { id, response })
    }

    /// Expects a `list` operation.
    pub fn expect_list(&mut self) -> ExpectationBuilder<T, Vec<T>> {
        ExpectationBuilder::new(self.expectations.clone(), |response| Expectation::List { response })
    }

    /// Expects an `action` operation on `id`.
    pub fn expect_action(&mut self, id: T::Id) -> ExpectationBuilder<T, T::ActionResult> {
        ExpectationBuilder::new(self.expectations.clone(), move |response| Expectation::Action { id, response })
    }

    /// Expects a `ping` operation.
    pub fn expect_ping(&mut self) -> ExpectationBuilder<T, usize> {
        ExpectationBuilder::new(self.expectations.clone(), |response| Expectation::Ping { response })
    }

    /// Items received by `insert` requests, in arrival order.
    pub fn inserted(&self) -> Vec<T> {
        self.inserted.lock().unwrap().clone()
    }

    /// Verifies that all expectations were met and nothing unexpected arrived.
    pub fn verify(&self) {
        let mismatches = self.mismatches.lock().unwrap();
        if !mismatches.is_empty() {
            panic!("Mock received unexpected requests: {:?}", *mismatches);
        }
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!("Not all expectations were met. {} remaining", exps.len());
        }
    }
}

/// Fluent builder shared by every expectation kind.
pub struct ExpectationBuilder<T: ActorEntity, R> {
    expectations: Queue<T>,
    build: Box<dyn FnOnce(Result<R, FrameworkError>) -> Expectation<T> + Send>,
}

impl<T: ActorEntity, R> ExpectationBuilder<T, R> {
    fn new(
        expectations: Queue<T>,
        build: impl FnOnce(Result<R, FrameworkError>) -> Expectation<T> + Send + 'static,
    ) -> Self {
        Self {
            expectations,
            build: Box::new(build),
        }
    }

    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, value: R) {
        let expectation = (self.build)(Ok(value));
        self.expectations.lock().unwrap().push_back(expectation);
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: FrameworkError) {
        let expectation = (self.build)(Err(error));
        self.expectations.lock().unwrap().push_back(expectation);
    }
}

fn describe<T: ActorEntity>(request: &ResourceRequest<T>) -> String {
    match request {
        ResourceRequest::Insert { item, .. } => format!("insert {}", item.id()),
        ResourceRequest::Get { id, .. } => format!("get {id}"),
        ResourceRequest::List { .. } => "list".to_string(),
        ResourceRequest::Action { id, .. } => format!("action on {id}"),
        ResourceRequest::Ping { .. } => "ping".to_string(),
    }
}

fn reject<T: ActorEntity>(request: ResourceRequest<T>) {
    match request {
        ResourceRequest::Insert { respond_to, .. } => {
            let _ = respond_to.send(Err(FrameworkError::ActorDropped));
        }
        ResourceRequest::Get { respond_to, .. } => {
            let _ = respond_to.send(Err(FrameworkError::ActorDropped));
        }
        ResourceRequest::List { respond_to } => {
            let _ = respond_to.send(Err(FrameworkError::ActorDropped));
        }
        ResourceRequest::Action { respond_to, .. } => {
            let _ = respond_to.send(Err(FrameworkError::ActorDropped));
        }
        ResourceRequest::Ping { respond_to } => {
            let _ = respond_to.send(Err(FrameworkError::ActorDropped));
        }
    }
}

/// Returns a client whose actor has already gone away. Every call fails with
/// [`FrameworkError::ActorClosed`].
pub fn closed_client<T: ActorEntity>() -> ResourceClient<T> {
    let (sender, receiver) = mpsc::channel(1);
    drop(receiver);
    ResourceClient::new(sender)
}
