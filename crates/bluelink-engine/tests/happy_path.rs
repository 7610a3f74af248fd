mod common;

use bluelink_container::MockBlueprintContainer;
use bluelink_core::changeset::ChangesetStatus;
use bluelink_core::container::CallerParams;
use bluelink_core::event::{ChannelType, EventKind};
use bluelink_engine::{ChangesetEngine, StartStagingInput};

/// §8 scenario 1: first-time deploy staging streams one resourceChanges
/// event followed by a terminal changeStagingComplete, and the changeset
/// lands on ChangesStaged.
#[tokio::test]
async fn happy_path_staging_streams_changes_then_completes() {
    let container = MockBlueprintContainer::builder()
        .with_stage_changes(vec![
            MockBlueprintContainer::single_new_resource("bucket", "s3::Bucket"),
            MockBlueprintContainer::complete(Default::default()),
        ])
        .build();
    let ctx = common::build_ctx(container);
    let engine = ChangesetEngine::new(ctx.clone());

    let changeset = engine
        .start_staging(StartStagingInput {
            instance_id: None,
            destroy: false,
            blueprint_location: common::blueprint_location(),
            params: CallerParams::default(),
            skip_drift_check: false,
        })
        .await
        .unwrap();
    assert_eq!(changeset.status, ChangesetStatus::Starting);

    let events = common::drain_until_end(&ctx, ChannelType::Changeset, changeset.id, 5).await;
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0].kind, EventKind::ResourceChanges(_)));
    assert!(!events[0].end);
    assert!(matches!(events[1].kind, EventKind::ChangeStagingComplete(_)));
    assert!(events[1].end);

    let persisted = ctx.changesets.get(changeset.id).await.unwrap();
    assert_eq!(persisted.status, ChangesetStatus::ChangesStaged);
    assert!(persisted.changes.is_some());
}
