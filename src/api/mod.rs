//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::gateway::PaymentGateway;
use crate::store::SharedStore;

pub use routes::create_router;

/// Shared state handed to every route and middleware
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(store: SharedStore, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: logging -> auth -> handler
    let protected_routes = create_router()
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        // Health check (no auth)
        .route("/health", get(health_check))
        .nest("/api/v1", protected_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
