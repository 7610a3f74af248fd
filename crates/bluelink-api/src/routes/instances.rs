//! Instance endpoints (§4.1, §4.4, §4.5): `/deployments/instances*`. Create,
//! update and destroy share one request shape and one worker body in the
//! deployment engine; reconciliation check/apply run synchronously.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use bluelink_core::event::ChannelType;
use bluelink_core::reconciliation::{
    ApplyReconciliationInput, ApplyReconciliationResult, CheckReconciliationInput, ReconcileItemAction,
    ReconcileScope, ReconciliationCheckResult,
};
use bluelink_core::ResourceId;
use bluelink_engine::{DeployOperation, StartDeployInput};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, DriftBlockedResponse};
use crate::identifiers::resolve_instance;
use crate::responses::Accepted;
use crate::sse::channel_stream;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deployments/instances", post(create_instance).get(list_instances))
        .route("/deployments/instances/{id}", get(get_instance).patch(update_instance))
        .route("/deployments/instances/{id}/exports", get(get_exports))
        .route("/deployments/instances/{id}/destroy", post(destroy_instance))
        .route("/deployments/instances/{id}/stream", get(stream_instance))
        .route(
            "/deployments/instances/{id}/reconciliation/check",
            post(check_reconciliation),
        )
        .route(
            "/deployments/instances/{id}/reconciliation/apply",
            post(apply_reconciliation),
        )
}

/// The shared request body for create/update/destroy (§4.5): the changeset
/// this operation was staged from, the plugin config to pass the container,
/// and the two booleans that steer the rollback coordinator and the drift
/// gate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployRequest {
    instance_name: Option<String>,
    changeset_id: ResourceId,
    #[serde(default)]
    plugin_config: Value,
    #[serde(default)]
    auto_rollback: bool,
    #[serde(default)]
    force: bool,
}

async fn create_instance(
    State(state): State<AppState>,
    Json(req): Json<DeployRequest>,
) -> Result<Accepted<bluelink_core::instance::Instance>, ApiError> {
    let prepared = state.plugin_config_preparer.prepare(&req.plugin_config).await?;
    let changeset = fetch_changeset(&state, req.changeset_id).await?;
    if changeset.destroy {
        return Err(ApiError::BadRequest(
            "changeset is a destroy changeset; cannot be used to create an instance".to_string(),
        ));
    }

    let instance = state
        .deployment_engine
        .start(StartDeployInput {
            operation: DeployOperation::Create,
            instance_id: None,
            instance_name: req.instance_name,
            blueprint_location: changeset.blueprint_location.clone(),
            params: prepared.values,
            auto_rollback: req.auto_rollback,
            changeset_id: Some(changeset.id),
            rollback: false,
            skipped_rollback_items: Vec::new(),
        })
        .await?;

    let last_event_id = deployment_last_event_id(&state, instance.id).await?;
    Ok(Accepted::new(last_event_id, instance))
}

async fn update_instance(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(req): Json<DeployRequest>,
) -> Result<Accepted<bluelink_core::instance::Instance>, ApiError> {
    let (instance, _version) = resolve_instance(state.ctx.instances.as_ref(), &identifier).await?;
    let prepared = state.plugin_config_preparer.prepare(&req.plugin_config).await?;
    let changeset = fetch_changeset(&state, req.changeset_id).await?;
    if changeset.destroy {
        return Err(ApiError::BadRequest(
            "changeset is a destroy changeset; cannot be used to update an instance".to_string(),
        ));
    }
    drift_gate(&state, instance.id, &changeset, req.force).await?;

    let instance = state
        .deployment_engine
        .start(StartDeployInput {
            operation: DeployOperation::Update,
            instance_id: Some(instance.id),
            instance_name: None,
            blueprint_location: changeset.blueprint_location.clone(),
            params: prepared.values,
            auto_rollback: req.auto_rollback,
            changeset_id: Some(changeset.id),
            rollback: false,
            skipped_rollback_items: Vec::new(),
        })
        .await?;

    let last_event_id = deployment_last_event_id(&state, instance.id).await?;
    Ok(Accepted::new(last_event_id, instance))
}

async fn destroy_instance(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(req): Json<DeployRequest>,
) -> Result<Accepted<bluelink_core::instance::Instance>, ApiError> {
    let (instance, _version) = resolve_instance(state.ctx.instances.as_ref(), &identifier).await?;
    let prepared = state.plugin_config_preparer.prepare(&req.plugin_config).await?;
    let changeset = fetch_changeset(&state, req.changeset_id).await?;
    if !changeset.destroy {
        return Err(ApiError::BadRequest(
            "changeset is not a destroy changeset; cannot be used to destroy an instance".to_string(),
        ));
    }
    drift_gate(&state, instance.id, &changeset, req.force).await?;

    let instance = state
        .deployment_engine
        .start(StartDeployInput {
            operation: DeployOperation::Destroy,
            instance_id: Some(instance.id),
            instance_name: None,
            blueprint_location: changeset.blueprint_location.clone(),
            params: prepared.values,
            auto_rollback: req.auto_rollback,
            changeset_id: Some(changeset.id),
            rollback: false,
            skipped_rollback_items: Vec::new(),
        })
        .await?;

    let last_event_id = deployment_last_event_id(&state, instance.id).await?;
    Ok(Accepted::new(last_event_id, instance))
}

async fn get_instance(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<bluelink_core::instance::Instance>, ApiError> {
    let (instance, _version) = resolve_instance(state.ctx.instances.as_ref(), &identifier).await?;
    Ok(Json(instance))
}

async fn get_exports(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<HashMap<String, Value>>, ApiError> {
    let (instance, _version) = resolve_instance(state.ctx.instances.as_ref(), &identifier).await?;
    Ok(Json(instance.exports))
}

async fn stream_instance(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    headers: HeaderMap,
) -> Result<axum::response::Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>>, ApiError> {
    let (instance, _version) = resolve_instance(state.ctx.instances.as_ref(), &identifier).await?;

    let cursor = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());
    let live = state.ctx.broadcaster.subscribe(ChannelType::Deployment, instance.id);
    let replay = state
        .ctx
        .events
        .replay_since(ChannelType::Deployment, instance.id, cursor)
        .await
        .map_err(bluelink_core::Error::from)?;

    Ok(channel_stream(replay, live))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list_instances(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<bluelink_core::instance::Instance>>, ApiError> {
    // The store's `list` only takes a name filter and a limit: fetch
    // enough rows to cover the requested page and slice off the offset
    // in-process rather than pushing pagination into the store trait.
    let fetch_count = query.limit.saturating_add(query.offset).max(query.limit);
    let instances = state
        .ctx
        .instances
        .list(query.search.as_deref(), fetch_count)
        .await
        .map_err(bluelink_core::Error::from)?;
    let page = instances
        .into_iter()
        .skip(query.offset.max(0) as usize)
        .take(query.limit.max(0) as usize)
        .collect();
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest {
    changeset_id: ResourceId,
    #[serde(default)]
    plugin_config: Value,
    #[serde(default)]
    scope: ReconcileScope,
    #[serde(default)]
    child_path: Option<Vec<String>>,
    #[serde(default = "default_true")]
    include_children: bool,
}

fn default_true() -> bool {
    true
}

async fn check_reconciliation(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<ReconciliationCheckResult>, ApiError> {
    let (instance, _version) = resolve_instance(state.ctx.instances.as_ref(), &identifier).await?;
    let prepared = state.plugin_config_preparer.prepare(&req.plugin_config).await?;
    let changeset = fetch_changeset(&state, req.changeset_id).await?;

    let input = CheckReconciliationInput {
        instance_id: instance.id,
        scope: req.scope,
        child_path: req.child_path,
        include_children: req.include_children,
    };
    let result = state
        .reconciliation_engine
        .check(changeset.id, &changeset.blueprint_location, &prepared.values, input)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest {
    changeset_id: ResourceId,
    #[serde(default)]
    plugin_config: Value,
    actions: Vec<ReconcileItemAction>,
}

async fn apply_reconciliation(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(req): Json<ApplyRequest>,
) -> Result<Json<ApplyReconciliationResult>, ApiError> {
    let (instance, _version) = resolve_instance(state.ctx.instances.as_ref(), &identifier).await?;
    let prepared = state.plugin_config_preparer.prepare(&req.plugin_config).await?;
    let changeset = fetch_changeset(&state, req.changeset_id).await?;

    let input = ApplyReconciliationInput {
        instance_id: instance.id,
        actions: req.actions,
    };
    let result = state
        .reconciliation_engine
        .apply(&changeset.blueprint_location, &prepared.values, input)
        .await?;
    Ok(Json(result))
}

/// §4.1: "fetch referenced changeset (fail 400 if missing)" — unlike every
/// other not-found, a dangling `changesetId` in a deploy/reconciliation
/// request is the caller's mistake, not a 404.
async fn fetch_changeset(state: &AppState, changeset_id: ResourceId) -> Result<bluelink_core::changeset::Changeset, ApiError> {
    state
        .ctx
        .changesets
        .get(changeset_id)
        .await
        .map_err(|_| ApiError::BadRequest(format!("changeset {changeset_id} not found")))
}

/// §4.4 drift gate: a changeset left in `DriftDetected` blocks deploy,
/// update and destroy unless the caller forces it.
async fn drift_gate(
    state: &AppState,
    instance_id: ResourceId,
    changeset: &bluelink_core::changeset::Changeset,
    force: bool,
) -> Result<(), ApiError> {
    if !bluelink_engine::drift_blocks_without_force(changeset.status, force) {
        return Ok(());
    }
    let record = state
        .ctx
        .reconciliation_results
        .get_latest_for_changeset(changeset.id)
        .await
        .map_err(bluelink_core::Error::from)?;
    Err(ApiError::DriftBlocked(Box::new(DriftBlockedResponse::new(
        instance_id,
        changeset.id,
        record.result,
    ))))
}

async fn deployment_last_event_id(state: &AppState, instance_id: ResourceId) -> Result<Option<bluelink_core::id::EventId>, ApiError> {
    Ok(state
        .ctx
        .events
        .get_last_event_id(ChannelType::Deployment, instance_id)
        .await
        .map_err(bluelink_core::Error::from)?)
}
