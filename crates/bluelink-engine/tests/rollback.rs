mod common;

use bluelink_container::MockBlueprintContainer;
use bluelink_core::container::{CallerParams, DeployMessageKind};
use bluelink_core::event::{ChannelType, EventKind};
use bluelink_core::instance::InstanceStatus;
use bluelink_engine::{DeployOperation, DeploymentEngine, StartDeployInput};

/// §8 scenario 4: a failed create with autoRollback=true tears the instance
/// down. The triggering finish carries `end=false`, a preRollbackState event
/// follows, then the destroy worker runs to completion on the same channel.
#[tokio::test]
async fn deploy_failed_with_auto_rollback_destroys_the_instance() {
    let container = MockBlueprintContainer::builder()
        .with_deploy(vec![DeployMessageKind::Finish {
            status: InstanceStatus::DeployFailed,
        }])
        .with_destroy(vec![DeployMessageKind::Finish {
            status: InstanceStatus::Destroyed,
        }])
        .build();
    let ctx = common::build_ctx(container.clone());
    let engine = DeploymentEngine::new(ctx.clone());

    let instance = engine
        .start(StartDeployInput {
            operation: DeployOperation::Create,
            instance_id: None,
            instance_name: Some("svc".to_string()),
            blueprint_location: common::blueprint_location(),
            params: CallerParams::default(),
            auto_rollback: true,
            changeset_id: None,
            rollback: false,
            skipped_rollback_items: Vec::new(),
        })
        .await
        .unwrap();

    let events =
        common::drain_until_end(&ctx, ChannelType::Deployment, instance.id, 5).await;

    assert!(matches!(events[0].kind, EventKind::Finish(_)));
    assert!(!events[0].end, "triggering finish must not close the stream");
    assert!(matches!(events[1].kind, EventKind::PreRollbackState(_)));
    assert!(!events[1].end);
    let last = events.last().unwrap();
    assert!(matches!(last.kind, EventKind::Finish(_)));
    assert!(last.end, "the destroy worker's own finish closes the stream");

    assert_eq!(container.destroy_call_count(), 1);
    assert_eq!(container.deploy_call_count(), 1);
}

/// A deploy failure with autoRollback=false never triggers the coordinator:
/// the finish event itself closes the stream.
#[tokio::test]
async fn deploy_failed_without_auto_rollback_just_finishes() {
    let container = MockBlueprintContainer::builder()
        .with_deploy(vec![DeployMessageKind::Finish {
            status: InstanceStatus::DeployFailed,
        }])
        .build();
    let ctx = common::build_ctx(container.clone());
    let engine = DeploymentEngine::new(ctx.clone());

    let instance = engine
        .start(StartDeployInput {
            operation: DeployOperation::Create,
            instance_id: None,
            instance_name: Some("svc".to_string()),
            blueprint_location: common::blueprint_location(),
            params: CallerParams::default(),
            auto_rollback: false,
            changeset_id: None,
            rollback: false,
            skipped_rollback_items: Vec::new(),
        })
        .await
        .unwrap();

    let events =
        common::drain_until_end(&ctx, ChannelType::Deployment, instance.id, 5).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].end);
    assert_eq!(container.destroy_call_count(), 0);
}
