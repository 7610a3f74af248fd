mod common;

use bluelink_container::MockBlueprintContainer;
use bluelink_core::changeset::{
    BlueprintChanges, ChangeKind, Changeset, ChangesetStatus, ResourceChangeInfo,
};
use bluelink_core::container::{CallerParams, DeployMessageKind};
use bluelink_core::event::{ChannelType, EventKind};
use bluelink_core::instance::{
    Instance, InstanceStatus, PreciseStatus, ResourceState, SkippedItemType,
};
use bluelink_core::ResourceId;
use bluelink_engine::{DeployOperation, DeploymentEngine, StartDeployInput};

/// §8 scenario 5: an update failure with autoRollback=true reverts via the
/// changeset's reversed diff, calling Deploy again rather than Destroy.
#[tokio::test]
async fn update_failed_with_auto_rollback_reverts_via_deploy() {
    let container = MockBlueprintContainer::builder()
        .with_deploy(vec![DeployMessageKind::Finish {
            status: InstanceStatus::UpdateFailed,
        }])
        .build();
    let ctx = common::build_ctx(container.clone());

    let instance_id = ResourceId::new();
    let now = chrono::Utc::now();
    let mut instance = Instance::new_preparing(instance_id, "svc", now);
    instance.resources.insert(
        "bucket".to_string(),
        ResourceState {
            name: "bucket".to_string(),
            resource_type: "s3::Bucket".to_string(),
            status: PreciseStatus::Updated,
            spec_data: serde_json::Value::Null,
            last_deployed_at: Some(now),
            failure_reasons: Vec::new(),
        },
    );
    ctx.instances.create(&instance).await.unwrap();

    let changeset_id = ResourceId::new();
    let changeset = Changeset {
        id: changeset_id,
        instance_id: Some(instance_id),
        destroy: false,
        blueprint_location: common::blueprint_location(),
        status: ChangesetStatus::ChangesStaged,
        changes: Some(BlueprintChanges {
            resource_changes: vec![ResourceChangeInfo {
                name: "bucket".to_string(),
                resource_type: "s3::Bucket".to_string(),
                kind: ChangeKind::Modified,
                fields_changed: vec!["versioning".to_string()],
            }],
            link_changes: Vec::new(),
            child_changes: Default::default(),
        }),
        created_at: now,
    };
    ctx.changesets.create(&changeset).await.unwrap();

    let engine = DeploymentEngine::new(ctx.clone());
    let instance = engine
        .start(StartDeployInput {
            operation: DeployOperation::Update,
            instance_id: Some(instance_id),
            instance_name: None,
            blueprint_location: common::blueprint_location(),
            params: CallerParams::default(),
            auto_rollback: true,
            changeset_id: Some(changeset_id),
            rollback: false,
            skipped_rollback_items: Vec::new(),
        })
        .await
        .unwrap();

    let events = common::drain_until_end(&ctx, ChannelType::Deployment, instance.id, 5).await;
    assert!(matches!(events[0].kind, EventKind::Finish(_)));
    assert!(!events[0].end);
    assert!(matches!(events[1].kind, EventKind::PreRollbackState(_)));
    let last = events.last().unwrap();
    assert!(matches!(last.kind, EventKind::Finish(_)));
    assert!(last.end);

    assert_eq!(container.deploy_call_count(), 2, "revert deploys again instead of destroying");
    assert_eq!(container.destroy_call_count(), 0);
}

/// §4.6/§9: a resource left mid-flight (not in the rollback-safe set) is
/// reported as a skipped item on the rollback worker's own terminal finish
/// event, not silently dropped.
#[tokio::test]
async fn revert_rollback_reports_skipped_items_on_its_finish_event() {
    let container = MockBlueprintContainer::builder()
        .with_deploy(vec![DeployMessageKind::Finish {
            status: InstanceStatus::UpdateFailed,
        }])
        .build();
    let ctx = common::build_ctx(container.clone());

    let instance_id = ResourceId::new();
    let now = chrono::Utc::now();
    let mut instance = Instance::new_preparing(instance_id, "svc", now);
    instance.resources.insert(
        "bucket".to_string(),
        ResourceState {
            name: "bucket".to_string(),
            resource_type: "s3::Bucket".to_string(),
            status: PreciseStatus::Updated,
            spec_data: serde_json::Value::Null,
            last_deployed_at: Some(now),
            failure_reasons: Vec::new(),
        },
    );
    instance.resources.insert(
        "queue".to_string(),
        ResourceState {
            name: "queue".to_string(),
            resource_type: "sqs::Queue".to_string(),
            status: PreciseStatus::Updating,
            spec_data: serde_json::Value::Null,
            last_deployed_at: None,
            failure_reasons: Vec::new(),
        },
    );
    ctx.instances.create(&instance).await.unwrap();

    let changeset_id = ResourceId::new();
    let changeset = Changeset {
        id: changeset_id,
        instance_id: Some(instance_id),
        destroy: false,
        blueprint_location: common::blueprint_location(),
        status: ChangesetStatus::ChangesStaged,
        changes: Some(BlueprintChanges {
            resource_changes: vec![ResourceChangeInfo {
                name: "bucket".to_string(),
                resource_type: "s3::Bucket".to_string(),
                kind: ChangeKind::Modified,
                fields_changed: vec!["versioning".to_string()],
            }],
            link_changes: Vec::new(),
            child_changes: Default::default(),
        }),
        created_at: now,
    };
    ctx.changesets.create(&changeset).await.unwrap();

    let engine = DeploymentEngine::new(ctx.clone());
    let instance = engine
        .start(StartDeployInput {
            operation: DeployOperation::Update,
            instance_id: Some(instance_id),
            instance_name: None,
            blueprint_location: common::blueprint_location(),
            params: CallerParams::default(),
            auto_rollback: true,
            changeset_id: Some(changeset_id),
            rollback: false,
            skipped_rollback_items: Vec::new(),
        })
        .await
        .unwrap();

    let events = common::drain_until_end(&ctx, ChannelType::Deployment, instance.id, 5).await;
    let last = events.last().unwrap();
    let EventKind::Finish(finish) = &last.kind else {
        panic!("expected the rollback worker's own finish event");
    };
    assert_eq!(finish.skipped_rollback_items.len(), 1);
    assert_eq!(finish.skipped_rollback_items[0].name, "queue");
    assert_eq!(finish.skipped_rollback_items[0].item_type, SkippedItemType::Resource);
    assert_eq!(finish.skipped_rollback_items[0].status, PreciseStatus::Updating);
}
