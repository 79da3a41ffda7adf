pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod state;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::{booking, dashboard, health, plate};
use state::AppState;

/// Full HTTP surface. Serve it with `into_make_service_with_connect_info::<SocketAddr>()`,
/// the plate upload handler keys retry counters by peer address.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(plate::router())
        .merge(booking::router())
        .merge(dashboard::router())
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
