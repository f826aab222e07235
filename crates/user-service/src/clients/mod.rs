//! Clients for services this one calls over the network.

pub mod order_service;

pub use order_service::{HttpOrderService, OrderService, OrderServiceError};
