//! Retention-GC endpoints that don't belong to a single record type
//! (§4.7): `/deployments/reconciliation-results/cleanup*` and
//! `/events/cleanup*`. Changeset cleanup lives alongside the changeset
//! routes since it shares that resource's retention period.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use bluelink_core::cleanup::CleanupType;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ApiError;
use crate::responses::Accepted;
use crate::state::AppState;
use bluelink_core::ResourceId;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/deployments/reconciliation-results/cleanup",
            post(start_reconciliation_cleanup),
        )
        .route(
            "/deployments/reconciliation-results/cleanup/{id}",
            get(get_reconciliation_cleanup),
        )
        .route("/events/cleanup", post(start_events_cleanup))
        .route("/events/cleanup/{id}", get(get_events_cleanup))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupRequest {
    retention_days: Option<u64>,
}

async fn start_reconciliation_cleanup(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> Result<Accepted<bluelink_core::cleanup::CleanupOperation>, ApiError> {
    let retention = req
        .retention_days
        .map(|days| Duration::from_secs(days * 86_400))
        .unwrap_or(state.ctx.timeouts.reconciliation_results_retention_period);
    let operation = state
        .cleanup_coordinator
        .start(CleanupType::ReconciliationResults, retention)
        .await?;
    Ok(Accepted::new(None, operation))
}

async fn get_reconciliation_cleanup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<bluelink_core::cleanup::CleanupOperation>, ApiError> {
    let operation = state.cleanup_coordinator.get(ResourceId::from_uuid(id)).await?;
    Ok(Json(operation))
}

async fn start_events_cleanup(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> Result<Accepted<bluelink_core::cleanup::CleanupOperation>, ApiError> {
    let retention = req
        .retention_days
        .map(|days| Duration::from_secs(days * 86_400))
        .unwrap_or(state.retention.events);
    let operation = state.cleanup_coordinator.start(CleanupType::Events, retention).await?;
    Ok(Accepted::new(None, operation))
}

async fn get_events_cleanup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<bluelink_core::cleanup::CleanupOperation>, ApiError> {
    let operation = state.cleanup_coordinator.get(ResourceId::from_uuid(id)).await?;
    Ok(Json(operation))
}
