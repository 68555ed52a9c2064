// Library exports for Terrace
// This allows integration tests and external code to use Terrace modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod site;
pub mod state;
pub mod storage;
pub mod stories;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router with tracing and CORS applied.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::auth::router())
        .merge(routes::stories::router())
        .merge(routes::site::router())
        .merge(routes::uploads::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
