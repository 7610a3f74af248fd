//! The `202 Accepted` envelope every long-running endpoint returns (§6.1):
//! the freshly persisted record plus the cursor a client should resume
//! streaming from.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bluelink_core::id::EventId;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Accepted<T: Serialize> {
    #[serde(rename = "lastEventID")]
    pub last_event_id: Option<EventId>,
    pub data: T,
}

impl<T: Serialize> Accepted<T> {
    pub fn new(last_event_id: Option<EventId>, data: T) -> Self {
        Self { last_event_id, data }
    }
}

impl<T: Serialize> IntoResponse for Accepted<T> {
    fn into_response(self) -> Response {
        (StatusCode::ACCEPTED, Json(self)).into_response()
    }
}
