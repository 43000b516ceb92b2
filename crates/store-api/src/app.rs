//! Router assembly: routes, per-request tracing and Sentry.

use std::time::Duration;

use axum::{Router, http::Request, http::Response, middleware};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::request_id_middleware;
use crate::routes;
use crate::state::AppState;

/// Build the complete application.
///
/// `rate_limit` enables the per-client limiter on register and login. It
/// keys on proxy headers or `ConnectInfo`, so serve with
/// `into_make_service_with_connect_info` when it is on.
pub fn build_router(state: AppState, rate_limit: bool) -> Router {
    routes::routes(&state, rate_limit)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
