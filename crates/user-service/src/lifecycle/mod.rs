//! # Lifecycle
//!
//! Everything that concerns the process as a whole rather than one request.
//!
//! - [`manager`] - [`LifecycleManager`] starts and stops the backing resources
//!   as a unit; [`ShutdownGate`] turns new work away once shutdown begins.
//! - [`system`] - [`UserServiceSystem`] builds the resources, the orchestrators
//!   and the router, and tears them down again.
//! - [`signal`] - SIGINT / SIGTERM handling.
//! - [`tracing`] - subscriber and trace-export setup.

pub mod manager;
pub mod signal;
pub mod system;
pub mod tracing;

pub use manager::{LifecycleError, LifecycleManager, ShutdownFailure, ShutdownGate, ShutdownReport};
pub use system::UserServiceSystem;
