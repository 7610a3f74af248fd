//! The blueprint container/loader traits.
//!
//! These are collaborator interfaces (§6.5 of the spec): the engine drives
//! them, but their implementation — the blueprint-loader subsystem that
//! evaluates blueprint source, computes diffs and performs provider calls —
//! is out of this core's scope. Modeled the way the teacher workspace models
//! its own out-of-process collaborators (`Executor`, `Deployer`): a
//! `Send + Sync` async trait, channel bundles for streamed progress, and a
//! `Result` alias shared with the rest of the crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::Result;
use crate::changeset::{ChangeKind, BlueprintChanges};
use crate::instance::{InstanceStatus, PreciseStatus};
use crate::reconciliation::{
    ApplyReconciliationInput, ApplyReconciliationResult, CheckReconciliationInput,
    ReconciliationCheckResult,
};
use crate::ResourceId;

/// Parameters supplied by the caller when staging/deploying/destroying.
pub type CallerParams = HashMap<String, serde_json::Value>;

/// Loads a blueprint container from a location URL or inline source.
#[async_trait]
pub trait BlueprintContainerLoader: Send + Sync {
    async fn load(&self, location: &url::Url, params: &CallerParams) -> Result<Box<dyn BlueprintContainer>>;

    async fn load_string(
        &self,
        source: &str,
        format: BlueprintFormat,
        params: &CallerParams,
    ) -> Result<Box<dyn BlueprintContainer>>;

    /// A placeholder container used by destroy operations, whose destroy
    /// path does not consult the original blueprint source.
    async fn placeholder(&self) -> Result<Box<dyn BlueprintContainer>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlueprintFormat {
    Yaml,
    Json,
}

#[derive(Debug, Clone)]
pub struct StageChangesMessage {
    pub kind: StageMessageKind,
}

#[derive(Debug, Clone)]
pub enum StageMessageKind {
    ResourceChange {
        name: String,
        resource_type: String,
        change_kind: ChangeKind,
    },
    ChildChange {
        name: String,
        change_kind: ChangeKind,
    },
    LinkChange {
        name: String,
        change_kind: ChangeKind,
    },
    Complete { changes: BlueprintChanges },
}

/// Channel bundle returned by `StageChanges`.
pub struct StageChannels {
    pub messages: mpsc::Receiver<StageChangesMessage>,
    pub errors: mpsc::Receiver<String>,
}

#[derive(Debug, Clone)]
pub enum DeployMessageKind {
    Resource {
        name: String,
        status: PreciseStatus,
        child_path: Vec<String>,
    },
    Child {
        name: String,
        status: InstanceStatus,
        child_path: Vec<String>,
    },
    Link {
        name: String,
        status: PreciseStatus,
        child_path: Vec<String>,
    },
    /// A status update for the instance as a whole. The very first message
    /// with `status == Preparing` on a create carries the engine-assigned
    /// instance id.
    DeploymentUpdate {
        instance_id: ResourceId,
        status: InstanceStatus,
    },
    Finish {
        status: InstanceStatus,
    },
    /// Output values produced by the deploy, merged into the instance
    /// record so `GET .../exports` can read them back. Not surfaced as an
    /// event of its own (§6.2 names a closed set of deployment event
    /// types and exports is not one of them).
    Exports {
        values: HashMap<String, serde_json::Value>,
    },
}

/// Channel bundle returned by `Deploy`/`Destroy`.
pub struct DeployChannels {
    pub messages: mpsc::Receiver<DeployMessageKind>,
    pub errors: mpsc::Receiver<String>,
}

/// Input to `StageChanges`/`Deploy`/`Destroy`: the resolved blueprint plus
/// the operation's parameters.
pub struct OperationInput {
    pub instance_id: Option<ResourceId>,
    pub destroy: bool,
    pub params: CallerParams,
}

/// The loaded, evaluable form of a blueprint. Implementations live outside
/// this core (the blueprint-loader subsystem); `bluelink-container` ships a
/// deterministic mock used by this workspace's own tests.
#[async_trait]
pub trait BlueprintContainer: Send + Sync {
    async fn stage_changes(&self, input: OperationInput) -> Result<StageChannels>;

    async fn deploy(&self, input: OperationInput) -> Result<DeployChannels>;

    async fn destroy(&self, input: OperationInput) -> Result<DeployChannels>;

    async fn check_reconciliation(
        &self,
        input: CheckReconciliationInput,
    ) -> Result<ReconciliationCheckResult>;

    async fn apply_reconciliation(
        &self,
        input: ApplyReconciliationInput,
    ) -> Result<ApplyReconciliationResult>;
}
