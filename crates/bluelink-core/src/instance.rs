//! Instance types: the deployed realisation of a blueprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ResourceId;

/// Status of an instance as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceStatus {
    Preparing,
    Deploying,
    Deployed,
    DeployFailed,
    DeployRollingBack,
    DeployRollbackComplete,
    DeployRollbackFailed,
    Updating,
    Updated,
    UpdateFailed,
    UpdateRollingBack,
    UpdateRollbackComplete,
    UpdateRollbackFailed,
    Destroying,
    Destroyed,
    DestroyFailed,
    DestroyRollingBack,
    DestroyRollbackComplete,
    DestroyRollbackFailed,
}

impl InstanceStatus {
    /// True for any status representing an in-flight or completed rollback.
    pub fn is_rollback(&self) -> bool {
        matches!(
            self,
            InstanceStatus::DeployRollingBack
                | InstanceStatus::DeployRollbackComplete
                | InstanceStatus::DeployRollbackFailed
                | InstanceStatus::UpdateRollingBack
                | InstanceStatus::UpdateRollbackComplete
                | InstanceStatus::UpdateRollbackFailed
                | InstanceStatus::DestroyRollingBack
                | InstanceStatus::DestroyRollbackComplete
                | InstanceStatus::DestroyRollbackFailed
        )
    }

    pub fn is_rolling_back(&self) -> bool {
        matches!(
            self,
            InstanceStatus::DeployRollingBack
                | InstanceStatus::UpdateRollingBack
                | InstanceStatus::DestroyRollingBack
        )
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", s.as_str().unwrap_or("unknown"))
    }
}

/// Fine-grained status of a single resource or link within an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreciseStatus {
    Creating,
    ConfigComplete,
    Created,
    CreateFailed,
    CreateRollingBack,
    CreateRollbackComplete,
    CreateRollbackFailed,
    Updating,
    Updated,
    UpdateFailed,
    UpdateRollingBack,
    UpdateRollbackComplete,
    UpdateRollbackFailed,
    UpdateInterrupted,
    Destroying,
    Destroyed,
    DestroyFailed,
    DestroyRollingBack,
    DestroyRollbackComplete,
    DestroyRollbackFailed,
    DestroyInterrupted,
}

impl PreciseStatus {
    /// The set of statuses rollback is allowed to touch: anything that is
    /// fully settled one way or the other. Anything mid-flight
    /// (`*Interrupted`, `*RollingBack`, `Creating`, `Updating`, `Destroying`)
    /// is left alone and reported as a skipped rollback item instead.
    pub fn is_rollback_safe(&self) -> bool {
        matches!(
            self,
            PreciseStatus::Created
                | PreciseStatus::Updated
                | PreciseStatus::Destroyed
                | PreciseStatus::ConfigComplete
        )
    }
}

impl std::fmt::Display for PreciseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", s.as_str().unwrap_or("unknown"))
    }
}

impl std::str::FromStr for PreciseStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| crate::Error::BadRequest(format!("unknown precise status '{s}'")))
    }
}

/// A single resource within an instance (or a nested child instance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub name: String,
    pub resource_type: String,
    pub status: PreciseStatus,
    pub spec_data: serde_json::Value,
    pub last_deployed_at: Option<DateTime<Utc>>,
    pub failure_reasons: Vec<String>,
}

/// A link between two resources within an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkState {
    pub name: String,
    pub status: PreciseStatus,
    pub intermediary_resources: Vec<ResourceState>,
    pub failure_reasons: Vec<String>,
}

/// A nested child blueprint instance, bounded to depth 10 when captured in a
/// rollback snapshot (§9 of the spec).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChildInstance {
    pub name: String,
    pub status: InstanceStatus,
    pub resources: HashMap<String, ResourceState>,
    pub links: HashMap<String, LinkState>,
    pub children: HashMap<String, ChildInstance>,
}

impl ChildInstance {
    /// Clone a bounded-depth copy of this child tree. Depth 0 means "stop
    /// here, discard further nesting" — used by the pre-rollback snapshot
    /// which caps total depth at 10.
    pub fn bounded_clone(&self, remaining_depth: u32) -> Self {
        if remaining_depth == 0 {
            return Self {
                name: self.name.clone(),
                status: self.status,
                resources: self.resources.clone(),
                links: self.links.clone(),
                children: HashMap::new(),
            };
        }
        Self {
            name: self.name.clone(),
            status: self.status,
            resources: self.resources.clone(),
            links: self.links.clone(),
            children: self
                .children
                .iter()
                .map(|(k, v)| (k.clone(), v.bounded_clone(remaining_depth - 1)))
                .collect(),
        }
    }
}

impl Default for InstanceStatus {
    fn default() -> Self {
        InstanceStatus::Preparing
    }
}

/// A deployed realisation of a blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: ResourceId,
    pub name: String,
    pub status: InstanceStatus,
    pub resources: HashMap<String, ResourceState>,
    pub links: HashMap<String, LinkState>,
    pub children: HashMap<String, ChildInstance>,
    /// Output values the container reported during deploy, keyed by name.
    /// Read back through `GET /deployments/instances/{id}/exports`.
    #[serde(default)]
    pub exports: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    pub fn new_preparing(id: ResourceId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            status: InstanceStatus::Preparing,
            resources: HashMap::new(),
            links: HashMap::new(),
            children: HashMap::new(),
            exports: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A bounded-depth snapshot used by the rollback coordinator's
    /// `preRollbackState` event.
    pub fn bounded_snapshot(&self, max_depth: u32) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            resources: self.resources.clone(),
            links: self.links.clone(),
            children: self
                .children
                .iter()
                .map(|(k, v)| (k.clone(), v.bounded_clone(max_depth.saturating_sub(1))))
                .collect(),
        }
    }
}

/// Snapshot of an instance captured before a rollback mutates it, plus the
/// failure reasons that triggered the rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub id: ResourceId,
    pub name: String,
    pub status: InstanceStatus,
    pub resources: HashMap<String, ResourceState>,
    pub links: HashMap<String, LinkState>,
    pub children: HashMap<String, ChildInstance>,
}

/// An item rollback chose not to touch because its current status was not
/// in the safe set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRollbackItem {
    pub name: String,
    pub item_type: SkippedItemType,
    pub child_path: Vec<String>,
    pub status: PreciseStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkippedItemType {
    Resource,
    Link,
}

pub const ROLLBACK_SNAPSHOT_MAX_DEPTH: u32 = 10;
