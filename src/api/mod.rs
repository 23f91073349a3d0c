//! API routes and handlers
//!
//! This module defines all API endpoints, their routing and the middleware
//! stack wrapped around them.

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{middleware, AppState};

mod health;
mod keys;
mod usage;

pub use health::*;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
}

/// Protected API routes (bearer token required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/keys", keys::routes())
        .nest("/usage", usage::routes())
}

/// Build the full application router with all middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Configure tracing for HTTP requests
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Authentication applies to protected routes only so health checks stay open
    Router::new()
        .nest("/api/v1", public_routes())
        .nest(
            "/api/v1",
            protected_routes().layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth_middleware,
            )),
        )
        .layer(axum::middleware::from_fn(
            middleware::api_cache_control_middleware,
        ))
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
}
