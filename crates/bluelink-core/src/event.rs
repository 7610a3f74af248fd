//! The event log's wire types.
//!
//! Event handling fans out on a tagged union (`EventKind`) rather than
//! reflection or inheritance: each variant carries its own payload, and a
//! worker's message loop branches on which channel produced the value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::changeset::BlueprintChanges;
use crate::id::EventId;
use crate::instance::{InstanceSnapshot, PreciseStatus, SkippedRollbackItem};
use crate::reconciliation::ReconciliationCheckResult;
use crate::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelType {
    Changeset,
    Deployment,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Changeset => write!(f, "changeset"),
            ChannelType::Deployment => write!(f, "deployment"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceChangeEvent {
    pub name: String,
    pub resource_type: String,
    pub kind: crate::changeset::ChangeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildChangeEvent {
    pub name: String,
    pub kind: crate::changeset::ChangeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkChangeEvent {
    pub name: String,
    pub kind: crate::changeset::ChangeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeStagingCompleteEvent {
    pub changes: BlueprintChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftDetectedEvent {
    pub result: ReconciliationCheckResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdateEvent {
    pub name: String,
    pub status: PreciseStatus,
    pub child_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildUpdateEvent {
    pub name: String,
    pub status: crate::instance::InstanceStatus,
    pub child_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkUpdateEvent {
    pub name: String,
    pub status: PreciseStatus,
    pub child_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceUpdateEvent {
    pub instance_id: ResourceId,
    pub status: crate::instance::InstanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreRollbackStateEvent {
    pub snapshot: InstanceSnapshot,
    pub failure_reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishEvent {
    pub status: crate::instance::InstanceStatus,
    pub skipped_rollback_items: Vec<SkippedRollbackItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    pub diagnostics: Vec<crate::error::ConfigDiagnostic>,
}

/// Tagged union of every event payload this log carries, fanned out across
/// the changeset and deployment channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum EventKind {
    ResourceChanges(ResourceChangeEvent),
    ChildChanges(ChildChangeEvent),
    LinkChanges(LinkChangeEvent),
    ChangeStagingComplete(ChangeStagingCompleteEvent),
    DriftDetected(DriftDetectedEvent),
    Resource(ResourceUpdateEvent),
    Child(ChildUpdateEvent),
    Link(LinkUpdateEvent),
    InstanceUpdate(InstanceUpdateEvent),
    PreRollbackState(PreRollbackStateEvent),
    Finish(FinishEvent),
    Error(ErrorEvent),
}

impl EventKind {
    /// The SSE `event:` field / wire event-type name, exactly as named in
    /// §6.2 of the spec.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::ResourceChanges(_) => "resourceChanges",
            EventKind::ChildChanges(_) => "childChanges",
            EventKind::LinkChanges(_) => "linkChanges",
            EventKind::ChangeStagingComplete(_) => "changeStagingComplete",
            EventKind::DriftDetected(_) => "driftDetected",
            EventKind::Resource(_) => "resource",
            EventKind::Child(_) => "child",
            EventKind::Link(_) => "link",
            EventKind::InstanceUpdate(_) => "instanceUpdate",
            EventKind::PreRollbackState(_) => "preRollbackState",
            EventKind::Finish(_) => "finish",
            EventKind::Error(_) => "error",
        }
    }
}

/// An immutable unit of the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub channel_type: ChannelType,
    pub channel_id: ResourceId,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    /// `true` marks end-of-stream for this channel/phase. At most one event
    /// per channel per phase may set this. When auto-rollback is about to
    /// fire, the triggering failure/finish event MUST have `end=false`.
    pub end: bool,
}

impl Event {
    pub fn new(
        id: EventId,
        channel_type: ChannelType,
        channel_id: ResourceId,
        kind: EventKind,
        timestamp: DateTime<Utc>,
        end: bool,
    ) -> Self {
        Self {
            id,
            channel_type,
            channel_id,
            kind,
            timestamp,
            end,
        }
    }
}
