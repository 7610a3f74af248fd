//! Reconciliation (drift detection) types.

use serde::{Deserialize, Serialize};

use crate::ResourceId;
use crate::instance::PreciseStatus;

/// Scope of a `CheckReconciliation` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReconcileScope {
    All,
    Interrupted,
    Specific {
        resource_names: Vec<String>,
        link_names: Vec<String>,
    },
}

impl Default for ReconcileScope {
    fn default() -> Self {
        ReconcileScope::All
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckReconciliationInput {
    pub instance_id: ResourceId,
    pub scope: ReconcileScope,
    pub child_path: Option<Vec<String>>,
    pub include_children: bool,
}

impl CheckReconciliationInput {
    pub fn new(instance_id: ResourceId) -> Self {
        Self {
            instance_id,
            scope: ReconcileScope::All,
            child_path: None,
            include_children: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FindingKind {
    Drift,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileItemType {
    Resource,
    Link,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileFinding {
    pub item_type: ReconcileItemType,
    pub name: String,
    pub kind: FindingKind,
    pub child_path: Vec<String>,
    pub persisted_status: PreciseStatus,
    pub details: String,
}

/// Result of a drift check, keyed by (changeset id, instance id) once
/// persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationCheckResult {
    pub findings: Vec<ReconcileFinding>,
    pub has_drift: bool,
    pub has_interrupted: bool,
    pub has_child_issues: bool,
}

impl ReconciliationCheckResult {
    pub fn from_findings(findings: Vec<ReconcileFinding>) -> Self {
        let has_drift = findings.iter().any(|f| f.kind == FindingKind::Drift);
        let has_interrupted = findings.iter().any(|f| f.kind == FindingKind::Interrupted);
        let has_child_issues = findings.iter().any(|f| !f.child_path.is_empty());
        Self {
            findings,
            has_drift,
            has_interrupted,
            has_child_issues,
        }
    }

    pub fn blocks_operation(&self) -> bool {
        self.has_drift || self.has_interrupted
    }
}

/// A persisted reconciliation result, keyed by changeset + instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResultRecord {
    pub id: ResourceId,
    pub changeset_id: ResourceId,
    pub instance_id: ResourceId,
    pub result: ReconciliationCheckResult,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Kind of corrective action `ApplyReconciliation` can take on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileActionKind {
    AcceptExternal,
    UpdateStatus,
    MarkFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediaryResourceAction {
    pub name: String,
    pub action: ReconcileActionKind,
    pub target_status: Option<PreciseStatus>,
    pub external_state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileItemAction {
    pub item_type: ReconcileItemType,
    pub name: String,
    pub action: ReconcileActionKind,
    pub external_state: Option<serde_json::Value>,
    pub target_status: PreciseStatus,
    pub child_path: Option<Vec<String>>,
    pub intermediary_resources: Vec<IntermediaryResourceAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReconciliationInput {
    pub instance_id: ResourceId,
    pub actions: Vec<ReconcileItemAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyItemError {
    pub item_type: ReconcileItemType,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyReconciliationResult {
    pub resources_updated: u32,
    pub links_updated: u32,
    pub errors: Vec<ApplyItemError>,
}

/// Validate `ReconcileItemAction`s before applying: `AcceptExternal`
/// requires `external_state`.
pub fn validate_apply_actions(
    actions: &[ReconcileItemAction],
) -> std::result::Result<(), crate::error::ValidationDiagnostic> {
    for (idx, action) in actions.iter().enumerate() {
        if action.action == ReconcileActionKind::AcceptExternal && action.external_state.is_none()
        {
            return Err(crate::error::ValidationDiagnostic {
                location: format!("actions[{idx}].externalState"),
                message: "externalState is required for acceptExternal actions".to_string(),
                kind: "missing_field".to_string(),
            });
        }
    }
    Ok(())
}
