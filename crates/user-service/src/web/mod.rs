//! # HTTP Surface
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /user` | [`handlers::create_user`] |
//! | `GET /users` | [`handlers::list_users`] |
//! | `GET /user?id=` | [`handlers::get_user`] |
//! | `GET /user/order?id=` | [`handlers::get_user_with_order`] |
//! | `GET /health` | [`handlers::health`] |
//!
//! Handlers only translate HTTP to orchestrator calls; every failure is mapped
//! to a status code by [`error::ApiError`].

pub mod error;
pub mod handlers;

use crate::correlation::{self, CorrelationContext, REQUEST_ID_HEADER, TRACEPARENT_HEADER};
use crate::orchestrator::{UserReader, UserWriter};
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub writer: UserWriter,
    pub reader: UserReader,
    pub request_timeout: Duration,
}

impl AppState {
    /// Correlation context for an inbound request, with the request deadline set.
    /// Must run inside the request span.
    pub fn context(&self, headers: &HeaderMap) -> CorrelationContext {
        CorrelationContext::from_incoming(header(headers, TRACEPARENT_HEADER), header(headers, REQUEST_ID_HEADER))
            .with_current_span()
            .with_timeout(self.request_timeout)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Request span whose exported parent is the caller's span.
fn request_span(request: &Request) -> tracing::Span {
    let span = tracing::info_span!("request", method = %request.method(), uri = %request.uri());
    correlation::link_remote_parent(&span, header(request.headers(), TRACEPARENT_HEADER));
    span
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/user", post(handlers::create_user).get(handlers::get_user))
        .route("/users", get(handlers::list_users))
        .route("/user/order", get(handlers::get_user_with_order))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}
