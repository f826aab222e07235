//! Data structures shared by the store, the orchestrators and the HTTP layer.

pub mod user;

pub use user::*;
