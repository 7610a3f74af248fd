//! Rollback coordinator (§4.6, C6). Consulted once a deployment worker's
//! finish event has been written; decides whether to tear down (destroy)
//! or revert (reverse changeset) and spawns exactly one corrective worker,
//! always with `autoRollback=false` so it can never recurse.

use std::sync::Arc;

use bluelink_core::changeset::BlueprintChanges;
use bluelink_core::container::CallerParams;
use bluelink_core::event::{ChannelType, Event, EventKind, PreRollbackStateEvent};
use bluelink_core::instance::{InstanceStatus, SkippedItemType, SkippedRollbackItem, ROLLBACK_SNAPSHOT_MAX_DEPTH};
use bluelink_core::ResourceId;

use crate::context::EngineContext;
use crate::deployment_engine::{DeployOperation, DeploymentEngine, StartDeployInput};

/// Key under which a revert-rollback's reverse changeset is smuggled into
/// the container's caller params, since the `Deploy` collaborator call has
/// no dedicated field for "deploy from this precomputed diff instead of
/// recomputing one against the source blueprint".
pub const REVERSE_CHANGES_PARAM: &str = "__reverseChanges";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackKind {
    Destroy,
    Revert,
}

pub struct RollbackCoordinator {
    ctx: Arc<EngineContext>,
}

impl RollbackCoordinator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// `shouldTriggerAutoRollback` from §8: `Destroy` iff the finish status
    /// is `DeployFailed`, `Revert` iff it's `UpdateFailed` or
    /// `DestroyFailed`, `None` otherwise (including every rolling-back or
    /// successful terminal status).
    pub fn rollback_kind_for(status: InstanceStatus) -> Option<RollbackKind> {
        match status {
            InstanceStatus::DeployFailed => Some(RollbackKind::Destroy),
            InstanceStatus::UpdateFailed | InstanceStatus::DestroyFailed => Some(RollbackKind::Revert),
            _ => None,
        }
    }

    pub async fn trigger(
        &self,
        kind: RollbackKind,
        instance_id: ResourceId,
        blueprint_location: url::Url,
        params: CallerParams,
        changeset_id: Option<ResourceId>,
    ) {
        let (instance, _version) = match self.ctx.instances.get(instance_id).await {
            Ok(found) => found,
            Err(_) => return,
        };

        let safe_resources: Vec<String> = instance
            .resources
            .values()
            .filter(|r| r.status.is_rollback_safe())
            .map(|r| r.name.clone())
            .collect();
        let safe_links: Vec<String> = instance
            .links
            .values()
            .filter(|l| l.status.is_rollback_safe())
            .map(|l| l.name.clone())
            .collect();

        let skipped_items: Vec<SkippedRollbackItem> = instance
            .resources
            .values()
            .filter(|r| !r.status.is_rollback_safe())
            .map(|r| SkippedRollbackItem {
                name: r.name.clone(),
                item_type: SkippedItemType::Resource,
                child_path: Vec::new(),
                status: r.status,
                reason: "resource status outside the rollback-safe set".to_string(),
            })
            .chain(instance.links.values().filter(|l| !l.status.is_rollback_safe()).map(|l| {
                SkippedRollbackItem {
                    name: l.name.clone(),
                    item_type: SkippedItemType::Link,
                    child_path: Vec::new(),
                    status: l.status,
                    reason: "link status outside the rollback-safe set".to_string(),
                }
            }))
            .collect();
        for item in &skipped_items {
            tracing::info!(
                instance_id = %instance_id,
                item_name = %item.name,
                item_type = ?item.item_type,
                status = ?item.status,
                reason = %item.reason,
                "rollback skipping item outside the safe status set",
            );
        }

        let snapshot = instance.bounded_snapshot(ROLLBACK_SNAPSHOT_MAX_DEPTH);
        let failure_reasons: Vec<String> = instance
            .resources
            .values()
            .flat_map(|r| r.failure_reasons.clone())
            .chain(instance.links.values().flat_map(|l| l.failure_reasons.clone()))
            .collect();

        let pre_rollback_event = Event::new(
            self.ctx.id_generator.next_id(),
            ChannelType::Deployment,
            instance_id,
            EventKind::PreRollbackState(PreRollbackStateEvent {
                snapshot,
                failure_reasons,
            }),
            self.ctx.clock.now(),
            false,
        );
        if self.ctx.save_event(pre_rollback_event).await.is_err() {
            return;
        }

        let deployer = DeploymentEngine::new(self.ctx.clone());

        match kind {
            RollbackKind::Destroy => {
                let mut params = params;
                let removal = BlueprintChanges::all_removed_from(&safe_resources, &safe_links);
                if let Ok(value) = serde_json::to_value(&removal) {
                    params.insert(REVERSE_CHANGES_PARAM.to_string(), value);
                }

                let _ = deployer
                    .start(StartDeployInput {
                        operation: DeployOperation::Destroy,
                        instance_id: Some(instance_id),
                        instance_name: None,
                        blueprint_location,
                        params,
                        auto_rollback: false,
                        changeset_id: None,
                        rollback: true,
                        skipped_rollback_items: skipped_items,
                    })
                    .await;
            }
            RollbackKind::Revert => {
                let mut params = params;
                if let Some(changeset_id) = changeset_id {
                    if let Ok(changeset) = self.ctx.changesets.get(changeset_id).await {
                        if let Some(changes) = changeset.changes {
                            let reverse = changes.reversed().filtered_to(&safe_resources, &safe_links);
                            if let Ok(value) = serde_json::to_value(&reverse) {
                                params.insert(REVERSE_CHANGES_PARAM.to_string(), value);
                            }
                        }
                    }
                }

                let _ = deployer
                    .start(StartDeployInput {
                        operation: DeployOperation::Update,
                        instance_id: Some(instance_id),
                        instance_name: None,
                        blueprint_location,
                        params,
                        auto_rollback: false,
                        changeset_id: None,
                        rollback: true,
                        skipped_rollback_items: skipped_items,
                    })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_failed_rolls_back_via_destroy() {
        assert_eq!(
            RollbackCoordinator::rollback_kind_for(InstanceStatus::DeployFailed),
            Some(RollbackKind::Destroy)
        );
    }

    #[test]
    fn update_and_destroy_failed_roll_back_via_revert() {
        assert_eq!(
            RollbackCoordinator::rollback_kind_for(InstanceStatus::UpdateFailed),
            Some(RollbackKind::Revert)
        );
        assert_eq!(
            RollbackCoordinator::rollback_kind_for(InstanceStatus::DestroyFailed),
            Some(RollbackKind::Revert)
        );
    }

    #[test]
    fn terminal_success_and_rolling_statuses_never_trigger_rollback() {
        assert_eq!(RollbackCoordinator::rollback_kind_for(InstanceStatus::Deployed), None);
        assert_eq!(RollbackCoordinator::rollback_kind_for(InstanceStatus::Updated), None);
        assert_eq!(RollbackCoordinator::rollback_kind_for(InstanceStatus::Destroyed), None);
        assert_eq!(
            RollbackCoordinator::rollback_kind_for(InstanceStatus::DeployRollingBack),
            None
        );
    }
}
