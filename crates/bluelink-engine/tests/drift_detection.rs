mod common;

use bluelink_container::MockBlueprintContainer;
use bluelink_core::changeset::ChangesetStatus;
use bluelink_core::container::CallerParams;
use bluelink_core::event::{ChannelType, EventKind};
use bluelink_core::instance::Instance;
use bluelink_core::reconciliation::ReconciliationCheckResult;
use bluelink_core::ResourceId;
use bluelink_engine::{ChangesetEngine, StartStagingInput};

/// §8 scenario 2: staging against an instance with drift stops short of
/// calling StageChanges and lands the changeset on DriftDetected.
#[tokio::test]
async fn drift_at_staging_short_circuits_before_stage_changes() {
    let container = MockBlueprintContainer::builder()
        .with_reconciliation_result(ReconciliationCheckResult {
            has_drift: true,
            ..Default::default()
        })
        .with_stage_changes(vec![MockBlueprintContainer::single_new_resource(
            "bucket",
            "s3::Bucket",
        )])
        .build();
    let ctx = common::build_ctx(container);

    let instance_id = ResourceId::new();
    let instance = Instance::new_preparing(instance_id, "my-instance", chrono::Utc::now());
    ctx.instances.create(&instance).await.unwrap();

    let engine = ChangesetEngine::new(ctx.clone());
    let changeset = engine
        .start_staging(StartStagingInput {
            instance_id: Some(instance_id),
            destroy: false,
            blueprint_location: common::blueprint_location(),
            params: CallerParams::default(),
            skip_drift_check: false,
        })
        .await
        .unwrap();

    let events = common::drain_until_end(&ctx, ChannelType::Changeset, changeset.id, 5).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].kind, EventKind::DriftDetected(_)));
    assert!(events[0].end);

    let persisted = ctx.changesets.get(changeset.id).await.unwrap();
    assert_eq!(persisted.status, ChangesetStatus::DriftDetected);
    assert!(persisted.changes.is_none());
}

/// `skipDriftCheck=true` bypasses the gate entirely, the way `force=true`
/// bypasses it on the deploy side (§4.4).
#[tokio::test]
async fn skip_drift_check_bypasses_the_gate() {
    let container = MockBlueprintContainer::builder()
        .with_reconciliation_result(ReconciliationCheckResult {
            has_drift: true,
            ..Default::default()
        })
        .with_stage_changes(vec![MockBlueprintContainer::complete(Default::default())])
        .build();
    let ctx = common::build_ctx(container);

    let instance_id = ResourceId::new();
    let instance = Instance::new_preparing(instance_id, "my-instance", chrono::Utc::now());
    ctx.instances.create(&instance).await.unwrap();

    let engine = ChangesetEngine::new(ctx.clone());
    let changeset = engine
        .start_staging(StartStagingInput {
            instance_id: Some(instance_id),
            destroy: false,
            blueprint_location: common::blueprint_location(),
            params: CallerParams::default(),
            skip_drift_check: true,
        })
        .await
        .unwrap();

    let events = common::drain_until_end(&ctx, ChannelType::Changeset, changeset.id, 5).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].kind, EventKind::ChangeStagingComplete(_)));

    let persisted = ctx.changesets.get(changeset.id).await.unwrap();
    assert_eq!(persisted.status, ChangesetStatus::ChangesStaged);
}
