//! API routes.

pub mod changes;
pub mod cleanup;
pub mod health;
pub mod instances;

use axum::Router;

use crate::state::AppState;

/// Build the main API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(changes::router())
        .merge(instances::router())
        .merge(cleanup::router())
        .merge(health::router())
        .with_state(state)
}
