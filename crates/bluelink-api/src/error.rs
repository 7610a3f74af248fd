//! API error handling (§7).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bluelink_core::error::{ConfigDiagnostic, ValidationDiagnostic};
use bluelink_core::reconciliation::ReconciliationCheckResult;
use bluelink_core::ResourceId;
use serde::Serialize;
use serde_json::json;

/// Body for a 409 raised by the drift gate (§4.4, §6.4): the caller must
/// reconcile the instance or retry with `force=true`.
#[derive(Debug, Serialize)]
pub struct DriftBlockedResponse {
    pub message: String,
    pub instance_id: ResourceId,
    pub changeset_id: ResourceId,
    pub result: ReconciliationCheckResult,
}

impl DriftBlockedResponse {
    pub fn new(instance_id: ResourceId, changeset_id: ResourceId, result: ReconciliationCheckResult) -> Self {
        Self {
            message: "instance has unresolved drift; reconcile it or retry with force=true".to_string(),
            instance_id,
            changeset_id,
            result,
        }
    }
}

/// API error type, shaped around the error kinds in §7.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Validation(Vec<ValidationDiagnostic>),
    PluginConfig(Vec<ConfigDiagnostic>),
    DriftBlocked(Box<DriftBlockedResponse>),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, Json(json!({ "message": msg }))).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "message": msg }))).into_response(),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "request validation failed", "errors": errors })),
            )
                .into_response(),
            ApiError::PluginConfig(diagnostics) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "plugin config invalid", "validationDiagnostics": diagnostics })),
            )
                .into_response(),
            ApiError::DriftBlocked(response) => (StatusCode::CONFLICT, Json(response)).into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, Json(json!({ "message": msg }))).into_response(),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": msg }))).into_response()
            }
        }
    }
}

impl From<bluelink_core::Error> for ApiError {
    fn from(err: bluelink_core::Error) -> Self {
        use bluelink_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::ValidationFailed(diags) => ApiError::Validation(diags),
            Error::PluginConfigInvalid(diags) => ApiError::PluginConfig(diags),
            // The drift gate always builds a `DriftBlockedResponse` itself,
            // carrying the reconciliation result the caller needs — this
            // arm only covers a bare `Error::DriftBlocked` reaching here by
            // some other path, which should not happen in practice.
            Error::DriftBlocked => ApiError::Conflict("drift blocked".to_string()),
            Error::BadRequest(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::DeploymentFailed(msg) => ApiError::Internal(msg),
            Error::Cancelled => ApiError::Internal("operation cancelled".to_string()),
            Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<bluelink_config::ConfigError> for ApiError {
    fn from(err: bluelink_config::ConfigError) -> Self {
        ApiError::from(bluelink_core::Error::from(err))
    }
}

impl From<bluelink_store::DbError> for ApiError {
    fn from(err: bluelink_store::DbError) -> Self {
        ApiError::from(bluelink_core::Error::from(err))
    }
}
