//! Router assembly.
//!
//! [`router`] builds the complete application without rate limiting, which
//! is what tests drive. The binary adds the limiter on `/api` via
//! [`router_with_rate_limit`] and wraps everything in the Sentry layers.

use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Request, Response},
    middleware::from_fn,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    api_rate_limiter, request_id_middleware, rate_limit::RateLimiterLayer,
    security_headers_middleware,
};
use crate::routes::{self, status};
use crate::state::AppState;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 10 * 1024;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    build(state, None)
}

/// Build the application router with per-IP rate limiting on `/api`.
///
/// The limiter keys on the peer address, so the server must be started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router_with_rate_limit(state: AppState) -> Router {
    build(state, Some(api_rate_limiter()))
}

fn build(state: AppState, limiter: Option<RateLimiterLayer>) -> Router {
    let api = Router::new().nest("/v1", routes::api_routes());
    let api = match limiter {
        Some(limiter) => api.layer(limiter),
        None => api,
    };

    Router::new()
        .route("/health", get(status::health))
        .route("/health/ready", get(status::readiness))
        .nest("/api", api)
        .fallback(status::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    #[allow(clippy::cast_possible_truncation)] // latency never nears u64::MAX ms
                    span.record("latency_ms", latency.as_millis() as u64);
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
}
