//! Application state.

use std::sync::Arc;
use std::time::Duration;

use bluelink_config::{BlueprintResolver, DefaultPluginConfigPreparer, PluginConfigPreparer};
use bluelink_core::clock::SystemClock;
use bluelink_core::container::BlueprintContainerLoader;
use bluelink_core::id::UuidV7EventIdGenerator;
use bluelink_engine::{
    ChangesetEngine, CleanupCoordinator, DeploymentEngine, EngineContext, EngineTimeouts,
    EventBroadcaster, ReconciliationEngine,
};
use bluelink_store::{
    PgChangesetStore, PgCleanupOperationStore, PgEventStore, PgInstanceStore,
    PgReconciliationResultStore,
};
use sqlx::PgPool;

/// Retention windows this server enforces that aren't already covered by
/// [`EngineTimeouts`] (which only carries the durations the engine layer
/// itself needs at construction time — see its doc comment).
#[derive(Debug, Clone, Copy)]
pub struct RetentionPeriods {
    pub events: Duration,
    pub changesets: Duration,
}

impl RetentionPeriods {
    pub fn from_env() -> Self {
        let days = |var: &str, default: u64| -> Duration {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|days| Duration::from_secs(days * 86_400))
                .unwrap_or(Duration::from_secs(default * 86_400))
        };
        Self {
            events: days("BLUELINK_EVENT_RETENTION_DAYS", 7),
            changesets: days("BLUELINK_CHANGESET_RETENTION_DAYS", 30),
        }
    }
}

/// Shared application state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<EngineContext>,
    pub changeset_engine: Arc<ChangesetEngine>,
    pub deployment_engine: Arc<DeploymentEngine>,
    pub reconciliation_engine: Arc<ReconciliationEngine>,
    pub cleanup_coordinator: Arc<CleanupCoordinator>,
    pub resolver: Arc<BlueprintResolver>,
    pub plugin_config_preparer: Arc<dyn PluginConfigPreparer>,
    pub retention: RetentionPeriods,
    /// Kept alongside the stores (which each hold their own clone) so the
    /// readiness probe has something to ping without reaching through a
    /// trait object.
    pub pool: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool, container_loader: Arc<dyn BlueprintContainerLoader>) -> Self {
        let timeouts = EngineTimeouts {
            deployment_timeout: Duration::from_secs(
                std::env::var("BLUELINK_DEPLOYMENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
            reconciliation_results_retention_period: Duration::from_secs(
                std::env::var("BLUELINK_RECONCILIATION_RETENTION_DAYS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(30)
                    * 86_400,
            ),
            drain_timeout: Duration::from_secs(
                std::env::var("BLUELINK_DRAIN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        };

        let ctx = Arc::new(EngineContext::new(
            Arc::new(PgEventStore::new(pool.clone())),
            Arc::new(PgChangesetStore::new(pool.clone())),
            Arc::new(PgReconciliationResultStore::new(pool.clone())),
            Arc::new(PgCleanupOperationStore::new(pool.clone())),
            Arc::new(PgInstanceStore::new(pool.clone())),
            container_loader,
            Arc::new(EventBroadcaster::new()),
            Arc::new(UuidV7EventIdGenerator),
            Arc::new(SystemClock),
            timeouts,
        ));

        Self {
            changeset_engine: Arc::new(ChangesetEngine::new(ctx.clone())),
            deployment_engine: Arc::new(DeploymentEngine::new(ctx.clone())),
            reconciliation_engine: Arc::new(ReconciliationEngine::new(ctx.clone())),
            cleanup_coordinator: Arc::new(CleanupCoordinator::new(ctx.clone())),
            resolver: Arc::new(BlueprintResolver),
            plugin_config_preparer: Arc::new(DefaultPluginConfigPreparer),
            retention: RetentionPeriods::from_env(),
            pool,
            ctx,
        }
    }
}
