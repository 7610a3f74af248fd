//! Shared dependencies every engine drives: stores, the blueprint container
//! loader, the live-event broadcaster, and the handful of durations the
//! spec treats as required configuration rather than optional knobs.

use std::sync::Arc;
use std::time::Duration;

use bluelink_core::clock::Clock;
use bluelink_core::container::BlueprintContainerLoader;
use bluelink_core::id::EventIdGenerator;
use bluelink_store::{
    ChangesetStore, CleanupOperationStore, EventStore, InstanceStore, ReconciliationResultStore,
};

use crate::broadcast::EventBroadcaster;

pub const CHANGESET_WORKER_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const RECONCILIATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const CLEANUP_WORKER_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Every duration this controller requires at construction time. The spec
/// leaves two constructor shapes on the table (with and without the
/// reconciliation-results retention period and drain timeout); this engine
/// settles on the shape that always takes both, since both gate real
/// behaviour (cleanup thresholds, graceful shutdown) rather than being
/// cosmetic (see DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct EngineTimeouts {
    pub deployment_timeout: Duration,
    pub reconciliation_results_retention_period: Duration,
    pub drain_timeout: Duration,
}

pub struct EngineContext {
    pub events: Arc<dyn EventStore>,
    pub changesets: Arc<dyn ChangesetStore>,
    pub reconciliation_results: Arc<dyn ReconciliationResultStore>,
    pub cleanup_operations: Arc<dyn CleanupOperationStore>,
    pub instances: Arc<dyn InstanceStore>,
    pub container_loader: Arc<dyn BlueprintContainerLoader>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub id_generator: Arc<dyn EventIdGenerator>,
    pub clock: Arc<dyn Clock>,
    pub timeouts: EngineTimeouts,
}

impl EngineContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: Arc<dyn EventStore>,
        changesets: Arc<dyn ChangesetStore>,
        reconciliation_results: Arc<dyn ReconciliationResultStore>,
        cleanup_operations: Arc<dyn CleanupOperationStore>,
        instances: Arc<dyn InstanceStore>,
        container_loader: Arc<dyn BlueprintContainerLoader>,
        broadcaster: Arc<EventBroadcaster>,
        id_generator: Arc<dyn EventIdGenerator>,
        clock: Arc<dyn Clock>,
        timeouts: EngineTimeouts,
    ) -> Self {
        Self {
            events,
            changesets,
            reconciliation_results,
            cleanup_operations,
            instances,
            container_loader,
            broadcaster,
            id_generator,
            clock,
            timeouts,
        }
    }

    pub async fn save_event(&self, event: bluelink_core::event::Event) -> bluelink_core::Result<()> {
        self.events
            .save(&event)
            .await
            .map_err(bluelink_core::Error::from)?;
        self.broadcaster.publish(&event);
        Ok(())
    }
}
