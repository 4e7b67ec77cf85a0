//! HTTP API application wiring (Axum router).
//!
//! - `routes/`: handlers (leaderboard, system)
//! - `errors.rs`: consistent JSON error responses

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use arena_infra::snapshot::SnapshotStore;

pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the tests).
pub fn build_app(store: SnapshotStore) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/leaderboard", get(routes::leaderboard::get_leaderboard))
        .fallback(routes::system::not_found)
        .layer(Extension(store))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
