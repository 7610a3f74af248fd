//! Background workers driving the changeset, deployment, reconciliation
//! and cleanup lifecycles, plus the in-process fan-out that lets SSE
//! handlers tail events the moment a worker saves them.

pub mod broadcast;
pub mod changeset_engine;
pub mod cleanup_engine;
pub mod context;
pub mod deployment_engine;
pub mod reconciliation_engine;
pub mod rollback;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use broadcast::EventBroadcaster;
pub use changeset_engine::{ChangesetEngine, StartStagingInput};
pub use cleanup_engine::CleanupCoordinator;
pub use context::{EngineContext, EngineTimeouts};
pub use deployment_engine::{DeployOperation, DeploymentEngine, StartDeployInput};
pub use reconciliation_engine::{drift_blocks_without_force, ReconciliationEngine};
pub use rollback::{RollbackCoordinator, RollbackKind};
