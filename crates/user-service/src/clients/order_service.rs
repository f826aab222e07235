//! # Order Service Client
//!
//! The order service owns order data. This service only ever asks it for the
//! order of one user (`GET /order?userId=`) and asks it to provision an order
//! for a newly created user (`POST /order?userId=`). The order payload is
//! opaque JSON and is passed through unchanged.
//!
//! Every request carries the caller's `traceparent` and `x-request-id`
//! headers and never outlives the caller's deadline.

use crate::correlation::CorrelationContext;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("order service request failed: {0}")]
    Transport(String),

    #[error("order service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("order service returned an invalid body: {0}")]
    Decode(String),

    #[error("invalid order service configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait OrderService: Send + Sync {
    /// Fetches the order JSON for `user_id`.
    async fn get_order(&self, ctx: &CorrelationContext, user_id: &str) -> Result<serde_json::Value, OrderServiceError>;

    /// Asks the order service to provision an order for `user_id`.
    async fn create_order(&self, ctx: &CorrelationContext, user_id: &str) -> Result<(), OrderServiceError>;
}

pub struct HttpOrderService {
    client: reqwest::Client,
    order_url: String,
}

impl HttpOrderService {
    /// `base_url` is `scheme://host:port`; `timeout` caps every request.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OrderServiceError> {
        let base = reqwest::Url::parse(base_url).map_err(|e| OrderServiceError::Config(format!("{base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrderServiceError::Config(e.to_string()))?;

        Ok(Self {
            client,
            order_url: format!("{}/order", base.as_str().trim_end_matches('/')),
        })
    }

    fn request(&self, method: Method, ctx: &CorrelationContext, user_id: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, &self.order_url)
            .query(&[("userId", user_id)]);
        for (name, value) in ctx.headers() {
            request = request.header(name, value);
        }
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, OrderServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| OrderServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(OrderServiceError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl OrderService for HttpOrderService {
    #[instrument(skip(self, ctx), fields(trace_id = ctx.trace_id()))]
    async fn get_order(&self, ctx: &CorrelationContext, user_id: &str) -> Result<serde_json::Value, OrderServiceError> {
        debug!("Sending request");
        let outbound = ctx.outbound();
        let response = self.send(self.request(Method::GET, &outbound, user_id)).await?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| OrderServiceError::Decode(e.to_string()))
    }

    #[instrument(skip(self, ctx), fields(trace_id = ctx.trace_id()))]
    async fn create_order(&self, ctx: &CorrelationContext, user_id: &str) -> Result<(), OrderServiceError> {
        debug!("Sending request");
        let outbound = ctx.outbound();
        self.send(self.request(Method::POST, &outbound, user_id)).await?;
        Ok(())
    }
}
