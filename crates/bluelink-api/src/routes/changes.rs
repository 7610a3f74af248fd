//! Changeset endpoints (§4.1, §4.3, §4.7): `/deployments/changes*`.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use bluelink_config::BlueprintSourceRequest;
use bluelink_core::cleanup::CleanupType;
use bluelink_core::event::ChannelType;
use bluelink_core::id::EventId;
use bluelink_core::ResourceId;
use bluelink_engine::StartStagingInput;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::responses::Accepted;
use crate::sse::channel_stream;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deployments/changes", post(create_changeset))
        .route("/deployments/changes/{id}", get(get_changeset))
        .route("/deployments/changes/{id}/stream", get(stream_changeset))
        .route("/deployments/changes/cleanup", post(start_cleanup))
        .route("/deployments/changes/cleanup/{id}", get(get_cleanup))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChangesetRequest {
    instance_id: Option<ResourceId>,
    #[serde(default)]
    destroy: bool,
    blueprint_source: BlueprintSourceRequest,
    #[serde(default)]
    plugin_config: Value,
    #[serde(default)]
    skip_drift_check: bool,
}

async fn create_changeset(
    State(state): State<AppState>,
    Json(req): Json<CreateChangesetRequest>,
) -> Result<Accepted<bluelink_core::changeset::Changeset>, ApiError> {
    let prepared = state.plugin_config_preparer.prepare(&req.plugin_config).await?;
    let location = state.resolver.resolve(&req.blueprint_source)?;

    let changeset = state
        .changeset_engine
        .start_staging(StartStagingInput {
            instance_id: req.instance_id,
            destroy: req.destroy,
            blueprint_location: location,
            params: prepared.values,
            skip_drift_check: req.skip_drift_check,
        })
        .await?;

    let last_event_id = state
        .ctx
        .events
        .get_last_event_id(ChannelType::Changeset, changeset.id)
        .await
        .map_err(bluelink_core::Error::from)?;
    Ok(Accepted::new(last_event_id, changeset))
}

async fn get_changeset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<bluelink_core::changeset::Changeset>, ApiError> {
    let id = ResourceId::from_uuid(id);
    let changeset = state.ctx.changesets.get(id).await.map_err(bluelink_core::Error::from)?;
    Ok(Json(changeset))
}

async fn stream_changeset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<axum::response::Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>>, ApiError> {
    let id = ResourceId::from_uuid(id);
    // Ensure the channel exists before subscribing, so an unknown id 404s
    // instead of hanging on an empty stream.
    state.ctx.changesets.get(id).await.map_err(bluelink_core::Error::from)?;

    let cursor = last_event_id_header(&headers);
    let live = state.ctx.broadcaster.subscribe(ChannelType::Changeset, id);
    let replay = state
        .ctx
        .events
        .replay_since(ChannelType::Changeset, id, cursor)
        .await
        .map_err(bluelink_core::Error::from)?;

    Ok(channel_stream(replay, live))
}

fn last_event_id_header(headers: &HeaderMap) -> Option<EventId> {
    headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupRequest {
    retention_days: Option<u64>,
}

async fn start_cleanup(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> Result<Accepted<bluelink_core::cleanup::CleanupOperation>, ApiError> {
    let retention = req
        .retention_days
        .map(|days| Duration::from_secs(days * 86_400))
        .unwrap_or(state.retention.changesets);
    let operation = state
        .cleanup_coordinator
        .start(CleanupType::Changesets, retention)
        .await?;
    Ok(Accepted::new(None, operation))
}

async fn get_cleanup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<bluelink_core::cleanup::CleanupOperation>, ApiError> {
    let operation = state.cleanup_coordinator.get(ResourceId::from_uuid(id)).await?;
    Ok(Json(operation))
}
