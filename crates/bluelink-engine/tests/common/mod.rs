use std::sync::Arc;
use std::time::Duration;

use bluelink_container::{MockBlueprintContainer, MockBlueprintContainerLoader};
use bluelink_core::clock::test_support::FixedClock;
use bluelink_core::id::UuidV7EventIdGenerator;
use bluelink_engine::test_support::{
    InMemoryChangesetStore, InMemoryCleanupOperationStore, InMemoryEventStore,
    InMemoryInstanceStore, InMemoryReconciliationResultStore,
};
use bluelink_engine::{EngineContext, EngineTimeouts, EventBroadcaster};

pub fn blueprint_location() -> url::Url {
    "file:///test/dir/test.blueprint.yaml".parse().unwrap()
}

pub fn build_ctx(container: MockBlueprintContainer) -> Arc<EngineContext> {
    let loader = MockBlueprintContainerLoader::new(container.clone()).with_placeholder(container);
    Arc::new(EngineContext::new(
        Arc::new(InMemoryEventStore::default()),
        Arc::new(InMemoryChangesetStore::default()),
        Arc::new(InMemoryReconciliationResultStore::default()),
        Arc::new(InMemoryCleanupOperationStore::default()),
        Arc::new(InMemoryInstanceStore::default()),
        Arc::new(loader),
        Arc::new(EventBroadcaster::new()),
        Arc::new(UuidV7EventIdGenerator),
        Arc::new(FixedClock::new(chrono::Utc::now())),
        EngineTimeouts {
            deployment_timeout: Duration::from_secs(30),
            reconciliation_results_retention_period: Duration::from_secs(86400),
            drain_timeout: Duration::from_secs(5),
        },
    ))
}

/// Drain `channel_type`/`channel_id` events off the broadcaster until the
/// terminal `end=true` event arrives, or `max` events have been seen.
pub async fn drain_until_end(
    ctx: &Arc<bluelink_engine::EngineContext>,
    channel_type: bluelink_core::event::ChannelType,
    channel_id: bluelink_core::ResourceId,
    max: usize,
) -> Vec<bluelink_core::event::Event> {
    let mut receiver = ctx.broadcaster.subscribe(channel_type, channel_id);
    let mut events = Vec::new();
    for _ in 0..max {
        match tokio::time::timeout(Duration::from_secs(2), receiver.recv()).await {
            Ok(Ok(event)) => {
                let is_end = event.end;
                events.push(event);
                if is_end {
                    break;
                }
            }
            _ => break,
        }
    }
    events
}
