//! # User Service
//!
//! A small record service: it creates users in a document store, announces
//! every state change on an event stream, and joins users with their orders
//! from a downstream order service.
//!
//! ## Architecture
//!
//! ```text
//!  HTTP (axum) ──> web::handlers ──> orchestrator::{UserWriter, UserReader}
//!                                        │            │             │
//!                                  DocumentStore  AuditEmitter  OrderService
//!                                        │            │             │
//!                     EmbeddedDocumentStore  EmbeddedEventStream  HttpOrderService
//!                      (ResourceActor)        (ResourceActor)      (reqwest)
//! ```
//!
//! The backing resources are started and stopped as a unit by the
//! [`lifecycle::LifecycleManager`]; [`lifecycle::UserServiceSystem`] wires them
//! into the orchestrators. A [`correlation::CorrelationContext`] travels with
//! every call and carries the request deadline.
//!
//! ## Modules
//!
//! - [`orchestrator`] - create and read sequences
//! - [`resources`] - document store, event stream, trace exporter
//! - [`clients`] - order service client
//! - [`audit`] - audit events and delivery reports
//! - [`retry`] - bounded retry with fixed backoff
//! - [`lifecycle`] - startup, shutdown, signals, logging
//! - [`web`] - routes and error mapping
//! - [`config`] - flags and environment variables

pub mod audit;
pub mod clients;
pub mod config;
pub mod correlation;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod orchestrator;
pub mod resources;
pub mod retry;
pub mod web;

pub use config::ServiceConfig;
pub use correlation::CorrelationContext;
pub use error::ServiceError;
pub use lifecycle::UserServiceSystem;
