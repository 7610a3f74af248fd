//! Reconciliation engine (§4.4, C4): drift checks and corrective actions,
//! exposed directly over HTTP rather than through the event log — there is
//! no `reconciliation` event channel, so these calls run synchronously
//! under a deadline instead of spawning a background worker.

use std::sync::Arc;

use bluelink_core::container::CallerParams;
use bluelink_core::reconciliation::{
    ApplyReconciliationInput, ApplyReconciliationResult, CheckReconciliationInput,
    ReconciliationCheckResult, ReconciliationResultRecord,
};
use bluelink_core::{Error, ResourceId, Result};

use crate::context::{EngineContext, RECONCILIATION_TIMEOUT};

pub struct ReconciliationEngine {
    ctx: Arc<EngineContext>,
}

impl ReconciliationEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub async fn check(
        &self,
        changeset_id: ResourceId,
        blueprint_location: &url::Url,
        params: &CallerParams,
        input: CheckReconciliationInput,
    ) -> Result<ReconciliationCheckResult> {
        let instance_id = input.instance_id;
        let result = tokio::time::timeout(RECONCILIATION_TIMEOUT, async {
            let container = self.ctx.container_loader.load(blueprint_location, params).await?;
            container.check_reconciliation(input).await
        })
        .await
        .map_err(|_| Error::Internal("reconciliation check timed out".to_string()))??;

        let record = ReconciliationResultRecord {
            id: ResourceId::new(),
            changeset_id,
            instance_id,
            result: result.clone(),
            created_at: self.ctx.clock.now(),
        };
        self.ctx
            .reconciliation_results
            .create(&record)
            .await
            .map_err(Error::from)?;

        Ok(result)
    }

    pub async fn apply(
        &self,
        blueprint_location: &url::Url,
        params: &CallerParams,
        input: ApplyReconciliationInput,
    ) -> Result<ApplyReconciliationResult> {
        bluelink_core::reconciliation::validate_apply_actions(&input.actions)
            .map_err(|diag| Error::ValidationFailed(vec![diag]))?;

        tokio::time::timeout(RECONCILIATION_TIMEOUT, async {
            let container = self.ctx.container_loader.load(blueprint_location, params).await?;
            container.apply_reconciliation(input).await
        })
        .await
        .map_err(|_| Error::Internal("reconciliation apply timed out".to_string()))?
    }
}

/// Used by the deployment engine's drift gate (§4.4): the controller
/// already knows a changeset's own `status` field, so the gate reads that
/// directly instead of re-querying the reconciliation-results store.
pub fn drift_blocks_without_force(changeset_status: bluelink_core::changeset::ChangesetStatus, force: bool) -> bool {
    changeset_status == bluelink_core::changeset::ChangesetStatus::DriftDetected && !force
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluelink_core::changeset::ChangesetStatus;

    #[test]
    fn force_bypasses_drift_gate() {
        assert!(!drift_blocks_without_force(ChangesetStatus::DriftDetected, true));
        assert!(drift_blocks_without_force(ChangesetStatus::DriftDetected, false));
        assert!(!drift_blocks_without_force(ChangesetStatus::ChangesStaged, false));
    }
}
