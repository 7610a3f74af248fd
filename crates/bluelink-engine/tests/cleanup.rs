mod common;

use std::time::Duration;

use bluelink_container::MockBlueprintContainer;
use bluelink_core::cleanup::{CleanupStatus, CleanupType};
use bluelink_core::event::{ChannelType, Event, EventKind, ResourceChangeEvent};
use bluelink_core::ResourceId;
use bluelink_engine::CleanupCoordinator;
use bluelink_store::EventStore;

async fn wait_for_completion(
    coordinator: &CleanupCoordinator,
    id: ResourceId,
) -> bluelink_core::cleanup::CleanupOperation {
    for _ in 0..50 {
        let op = coordinator.get(id).await.unwrap();
        if op.status != CleanupStatus::Running {
            return op;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cleanup operation never left Running");
}

/// §4.7 / §8 scenario 6: events older than the retention threshold are
/// deleted, recent ones survive, and the operation reports how many.
#[tokio::test]
async fn cleanup_deletes_only_events_past_retention() {
    let ctx = common::build_ctx(MockBlueprintContainer::default());

    let channel_id = ResourceId::new();
    let old_event = Event::new(
        bluelink_core::id::EventId::from_uuid(uuid::Uuid::now_v7()),
        ChannelType::Deployment,
        channel_id,
        EventKind::ResourceChanges(ResourceChangeEvent {
            name: "bucket".to_string(),
            resource_type: "s3::Bucket".to_string(),
            kind: bluelink_core::changeset::ChangeKind::New,
        }),
        chrono::Utc::now() - chrono::Duration::hours(2),
        false,
    );
    let recent_event = Event::new(
        bluelink_core::id::EventId::from_uuid(uuid::Uuid::now_v7()),
        ChannelType::Deployment,
        channel_id,
        EventKind::ResourceChanges(ResourceChangeEvent {
            name: "bucket".to_string(),
            resource_type: "s3::Bucket".to_string(),
            kind: bluelink_core::changeset::ChangeKind::New,
        }),
        chrono::Utc::now(),
        false,
    );
    ctx.events.save(&old_event).await.unwrap();
    ctx.events.save(&recent_event).await.unwrap();

    let coordinator = CleanupCoordinator::new(ctx.clone());
    let operation = coordinator
        .start(CleanupType::Events, Duration::from_secs(3600))
        .await
        .unwrap();
    assert_eq!(operation.status, CleanupStatus::Running);

    let completed = wait_for_completion(&coordinator, operation.id).await;
    assert_eq!(completed.status, CleanupStatus::Completed);
    assert_eq!(completed.items_deleted, Some(1));

    let remaining = ctx
        .events
        .replay_since(ChannelType::Deployment, channel_id, None)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, recent_event.id);
}
