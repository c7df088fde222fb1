//! Route modules, one router per API area.

pub mod federation;
pub mod health;
pub mod jobs;
pub mod verification;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// All API routes, still waiting for state.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::router())
        .merge(verification::router())
        .merge(jobs::router())
        .merge(federation::router())
}
