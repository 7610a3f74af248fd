//! Health check endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready means the pool can still reach Postgres, not just that the process
/// is up — a container past `health` but failing `ready` should be pulled
/// out of rotation rather than sent traffic.
async fn ready(State(state): State<AppState>) -> (axum::http::StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (axum::http::StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "error": e.to_string() })),
        ),
    }
}
