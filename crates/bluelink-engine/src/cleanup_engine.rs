//! Cleanup coordinator (§4.7, C7): retention-driven GC of events,
//! changesets and reconciliation results, reported as async operations the
//! same way deploys are.

use std::sync::Arc;
use std::time::Duration;

use bluelink_core::cleanup::{CleanupOperation, CleanupType};
use bluelink_core::{Error, ResourceId, Result};

use crate::context::{EngineContext, CLEANUP_WORKER_TIMEOUT};

pub struct CleanupCoordinator {
    ctx: Arc<EngineContext>,
}

impl CleanupCoordinator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Synchronous phase: persist the operation as `Running` with
    /// `threshold = now - retention_period`, then spawn the GC worker.
    pub async fn start(
        &self,
        cleanup_type: CleanupType,
        retention_period: Duration,
    ) -> Result<CleanupOperation> {
        let now = self.ctx.clock.now();
        let threshold = now
            - chrono::Duration::from_std(retention_period)
                .map_err(|e| Error::Internal(e.to_string()))?;
        let operation = CleanupOperation::start(ResourceId::new(), cleanup_type, threshold, now);
        self.ctx
            .cleanup_operations
            .create(&operation)
            .await
            .map_err(Error::from)?;

        let ctx = self.ctx.clone();
        let operation_id = operation.id;
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                CLEANUP_WORKER_TIMEOUT,
                run_cleanup(&ctx, cleanup_type, threshold),
            )
            .await;

            let mut op = match ctx.cleanup_operations.get(operation_id).await {
                Ok(op) => op,
                Err(_) => return,
            };

            match outcome {
                Ok(Ok(items_deleted)) => {
                    tracing::info!(operation_id = %operation_id, ?cleanup_type, items_deleted, "cleanup completed");
                    op.complete(items_deleted, ctx.clock.now());
                }
                Ok(Err(e)) => {
                    tracing::warn!(operation_id = %operation_id, ?cleanup_type, error = %e, "cleanup failed");
                    op.fail(e.to_string(), ctx.clock.now());
                }
                Err(_) => {
                    tracing::warn!(operation_id = %operation_id, ?cleanup_type, "cleanup worker timed out");
                    op.fail("cleanup worker timed out".to_string(), ctx.clock.now());
                }
            }
            let _ = ctx.cleanup_operations.update(&op).await;
        });

        Ok(operation)
    }

    pub async fn get(&self, id: ResourceId) -> Result<CleanupOperation> {
        self.ctx.cleanup_operations.get(id).await.map_err(Error::from)
    }
}

async fn run_cleanup(
    ctx: &EngineContext,
    cleanup_type: CleanupType,
    threshold: chrono::DateTime<chrono::Utc>,
) -> Result<u64> {
    let deleted = match cleanup_type {
        CleanupType::Events => ctx.events.cleanup(threshold).await,
        CleanupType::Changesets => ctx.changesets.cleanup(threshold).await,
        CleanupType::ReconciliationResults => ctx.reconciliation_results.cleanup(threshold).await,
        CleanupType::Validations => {
            // No standalone validation-record store exists in this core:
            // validation failures never persist past the synchronous HTTP
            // response that reports them (§4.1), so there is nothing to GC.
            Ok(0)
        }
    };
    deleted.map_err(Error::from)
}
