//! HTTP surface and lifecycle controller for the switchboard server.

pub mod app;
pub mod error;
pub mod handler;

use arc_swap::ArcSwap;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use switchboard_core::config::Config;
use tower_http::trace::TraceLayer;

pub use app::{ServerState, run_server};
pub use error::ServerError;

/// State injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<Config>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<ArcSwap<Config>>) -> Self {
        Self {
            config,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/system/ping",
            axum::routing::get(handler::system::ping),
        )
        .route(
            "/api/v1/system/status",
            axum::routing::get(handler::system::status),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
