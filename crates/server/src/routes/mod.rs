// crates/server/src/routes/mod.rs
//! API route handlers for the dupe-manager server.

pub mod health;
pub mod metrics;
pub mod scans;
pub mod stream;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// All routes: API endpoints nested under `/api`, plus `/metrics` at the root.
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(health::router())
                .merge(scans::router())
                .merge(stream::router()),
        )
        .merge(metrics::router())
        .with_state(state)
}
