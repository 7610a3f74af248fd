//! Changeset types: the persisted diff between a blueprint and an instance's
//! current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangesetStatus {
    Starting,
    StagingChanges,
    ChangesStaged,
    Failed,
    DriftDetected,
}

impl std::fmt::Display for ChangesetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", s.as_str().unwrap_or("unknown"))
    }
}

/// How a single resource, link or child differs between the blueprint and
/// the instance's persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Modified,
    Unchanged,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceChangeInfo {
    pub name: String,
    pub resource_type: String,
    pub kind: ChangeKind,
    pub fields_changed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkChangeInfo {
    pub name: String,
    pub kind: ChangeKind,
}

/// A tree of new/modified/unchanged/removed resources, links and children.
/// Produced by the changeset engine, and later reversed by the rollback
/// coordinator's revert path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlueprintChanges {
    pub resource_changes: Vec<ResourceChangeInfo>,
    pub link_changes: Vec<LinkChangeInfo>,
    pub child_changes: std::collections::HashMap<String, BlueprintChanges>,
}

impl BlueprintChanges {
    /// Derive the removal-only change set used by a destroy-kind rollback:
    /// every resource/link currently present becomes a `Removed` entry.
    pub fn all_removed_from(resource_names: &[String], link_names: &[String]) -> Self {
        Self {
            resource_changes: resource_names
                .iter()
                .map(|name| ResourceChangeInfo {
                    name: name.clone(),
                    resource_type: String::new(),
                    kind: ChangeKind::Removed,
                    fields_changed: Vec::new(),
                })
                .collect(),
            link_changes: link_names
                .iter()
                .map(|name| LinkChangeInfo {
                    name: name.clone(),
                    kind: ChangeKind::Removed,
                })
                .collect(),
            child_changes: std::collections::HashMap::new(),
        }
    }

    /// The reverse of a changeset: `New` becomes a removal, `Removed`
    /// becomes a creation, `Modified`/`Unchanged` pass through. Used by the
    /// revert-rollback path to undo an update or destroy.
    pub fn reversed(&self) -> Self {
        let flip = |kind: ChangeKind| match kind {
            ChangeKind::New => ChangeKind::Removed,
            ChangeKind::Removed => ChangeKind::New,
            other => other,
        };
        Self {
            resource_changes: self
                .resource_changes
                .iter()
                .map(|c| ResourceChangeInfo {
                    name: c.name.clone(),
                    resource_type: c.resource_type.clone(),
                    kind: flip(c.kind),
                    fields_changed: c.fields_changed.clone(),
                })
                .collect(),
            link_changes: self
                .link_changes
                .iter()
                .map(|c| LinkChangeInfo {
                    name: c.name.clone(),
                    kind: flip(c.kind),
                })
                .collect(),
            child_changes: self
                .child_changes
                .iter()
                .map(|(k, v)| (k.clone(), v.reversed()))
                .collect(),
        }
    }

    /// Restrict this change set to only the resources/links named in the
    /// given safe sets — used when filtering a reverse changeset against
    /// the instance's *current* state before rollback applies it.
    pub fn filtered_to(&self, safe_resources: &[String], safe_links: &[String]) -> Self {
        Self {
            resource_changes: self
                .resource_changes
                .iter()
                .filter(|c| safe_resources.contains(&c.name))
                .cloned()
                .collect(),
            link_changes: self
                .link_changes
                .iter()
                .filter(|c| safe_links.contains(&c.name))
                .cloned()
                .collect(),
            child_changes: self.child_changes.clone(),
        }
    }
}

/// Immutable-after-terminal record of a computed diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changeset {
    pub id: ResourceId,
    /// Empty (nil) for a first-time deployment; otherwise references an
    /// existing instance.
    pub instance_id: Option<ResourceId>,
    pub destroy: bool,
    pub blueprint_location: url::Url,
    pub status: ChangesetStatus,
    pub changes: Option<BlueprintChanges>,
    pub created_at: DateTime<Utc>,
}

impl Changeset {
    pub fn new_starting(
        id: ResourceId,
        instance_id: Option<ResourceId>,
        destroy: bool,
        blueprint_location: url::Url,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            instance_id,
            destroy,
            blueprint_location,
            status: ChangesetStatus::Starting,
            changes: None,
            created_at: now,
        }
    }
}
