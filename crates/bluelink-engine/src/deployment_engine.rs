//! Deployment engine (§4.5, C5): drives `Deploy`/`Destroy` against a loaded
//! blueprint container and turns its message channels into instance-channel
//! events. Create, update and destroy share one worker body, the way the
//! spec requires.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bluelink_core::container::{CallerParams, DeployMessageKind, OperationInput};
use bluelink_core::event::{ChannelType, Event, EventKind, ErrorEvent, FinishEvent};
use bluelink_core::event::{ChildUpdateEvent, InstanceUpdateEvent, LinkUpdateEvent, ResourceUpdateEvent};
use bluelink_core::instance::{Instance, InstanceStatus, SkippedRollbackItem};
use bluelink_core::{Error, ResourceId, Result};

use crate::context::EngineContext;
use crate::rollback::RollbackCoordinator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOperation {
    Create,
    Update,
    Destroy,
}

pub struct StartDeployInput {
    pub operation: DeployOperation,
    pub instance_id: Option<ResourceId>,
    pub instance_name: Option<String>,
    pub blueprint_location: url::Url,
    pub params: CallerParams,
    pub auto_rollback: bool,
    /// The changeset this operation was started from, when any — an update
    /// or create always has one; a rollback-spawned worker reuses the
    /// original operation's changeset so revert-rollback can read its
    /// `Changes` back out.
    pub changeset_id: Option<ResourceId>,
    /// Set by the rollback coordinator when it spawns a corrective worker,
    /// so that worker never spawns another one (§8: rollback recursion is
    /// bounded).
    pub rollback: bool,
    /// Items the rollback coordinator chose not to touch because their
    /// status wasn't in the safe set (§4.6, §9). Empty for every non-rollback
    /// deploy; carried verbatim onto this worker's terminal finish event.
    pub skipped_rollback_items: Vec<SkippedRollbackItem>,
}

#[derive(Clone)]
pub struct DeploymentEngine {
    ctx: Arc<EngineContext>,
}

impl DeploymentEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Synchronous phase: for a create, persist a new `Preparing` instance
    /// up front so the 202 response can carry an id even before the
    /// container's first `deploymentUpdate` arrives; for update/destroy,
    /// verify the instance exists and return it unchanged.
    pub fn start(&self, input: StartDeployInput) -> Pin<Box<dyn Future<Output = Result<Instance>> + Send + '_>> {
        Box::pin(async move {
            let instance = match input.operation {
                DeployOperation::Create => {
                    let id = input.instance_id.unwrap_or_else(ResourceId::new);
                    let name = input
                        .instance_name
                        .clone()
                        .unwrap_or_else(|| id.to_string());
                    let instance = Instance::new_preparing(id, name, self.ctx.clock.now());
                    self.ctx.instances.create(&instance).await.map_err(Error::from)?;
                    instance
                }
                DeployOperation::Update | DeployOperation::Destroy => {
                    let id = input
                        .instance_id
                        .ok_or_else(|| Error::BadRequest("instance id is required".to_string()))?;
                    let (instance, _version) = self.ctx.instances.get(id).await.map_err(Error::from)?;
                    instance
                }
            };

            let ctx = self.ctx.clone();
            let instance_id = instance.id;
            tokio::spawn(async move {
                let timeout = ctx.timeouts.deployment_timeout;
                let outcome = tokio::time::timeout(timeout, run_deploy_worker(ctx.clone(), instance_id, input)).await;
                if outcome.is_err() {
                    emit_terminal_error(&ctx, instance_id, "deployment worker timed out").await;
                }
            });

            Ok(instance)
        })
    }
}

async fn run_deploy_worker(ctx: Arc<EngineContext>, instance_id: ResourceId, input: StartDeployInput) {
    // Destroy obtains its container from a placeholder blueprint: the
    // container's destroy path tears down what was previously deployed and
    // never consults the source blueprint.
    let loaded = if input.operation == DeployOperation::Destroy {
        ctx.container_loader.placeholder().await
    } else {
        ctx.container_loader.load(&input.blueprint_location, &input.params).await
    };
    let container = match loaded {
        Ok(container) => container,
        Err(e) => {
            emit_terminal_error(&ctx, instance_id, &e.to_string()).await;
            return;
        }
    };

    let operation_input = OperationInput {
        instance_id: Some(instance_id),
        destroy: input.operation == DeployOperation::Destroy,
        params: input.params.clone(),
    };

    let channels = if input.operation == DeployOperation::Destroy {
        container.destroy(operation_input).await
    } else {
        container.deploy(operation_input).await
    };

    let mut channels = match channels {
        Ok(channels) => channels,
        Err(e) => {
            emit_terminal_error(&ctx, instance_id, &e.to_string()).await;
            return;
        }
    };

    let mut finish_status: Option<InstanceStatus> = None;

    loop {
        tokio::select! {
            message = channels.messages.recv() => {
                match message {
                    Some(message) => {
                        if let Some(status) = forward_deploy_message(&ctx, instance_id, message).await {
                            finish_status = Some(status);
                            break;
                        }
                    }
                    None => break,
                }
            }
            error = channels.errors.recv() => {
                if let Some(error) = error {
                    emit_terminal_error(&ctx, instance_id, &error).await;
                    return;
                }
            }
        }
    }

    let Some(finish_status) = finish_status else {
        return;
    };

    let rollback_kind = if input.rollback {
        None
    } else {
        RollbackCoordinator::rollback_kind_for(finish_status)
    };
    let will_rollback = input.auto_rollback && rollback_kind.is_some();

    let finish_event = Event::new(
        ctx.id_generator.next_id(),
        ChannelType::Deployment,
        instance_id,
        EventKind::Finish(FinishEvent {
            status: finish_status,
            skipped_rollback_items: input.skipped_rollback_items.clone(),
        }),
        ctx.clock.now(),
        !will_rollback,
    );
    if ctx.save_event(finish_event).await.is_err() {
        return;
    }

    if will_rollback {
        if let Some(kind) = rollback_kind {
            let coordinator = RollbackCoordinator::new(ctx.clone());
            coordinator
                .trigger(
                    kind,
                    instance_id,
                    input.blueprint_location.clone(),
                    input.params.clone(),
                    input.changeset_id,
                )
                .await;
        }
    }
}

/// Forward one deploy/destroy message as an event. Returns the finish
/// status once a `Finish` message arrives, telling the caller loop to stop
/// (the finish event itself is emitted by the caller, since whether it
/// carries `End=true` depends on whether auto-rollback will follow).
async fn forward_deploy_message(
    ctx: &EngineContext,
    instance_id: ResourceId,
    message: DeployMessageKind,
) -> Option<InstanceStatus> {
    let now = ctx.clock.now();
    if let DeployMessageKind::Exports { values } = message {
        if let Ok((mut instance, version)) = ctx.instances.get(instance_id).await {
            instance.exports.extend(values);
            instance.updated_at = now;
            let _ = ctx.instances.compare_and_swap(&instance, version).await;
        }
        return None;
    }
    let kind = match message {
        DeployMessageKind::Resource {
            name,
            status,
            child_path,
        } => EventKind::Resource(ResourceUpdateEvent {
            name,
            status,
            child_path,
        }),
        DeployMessageKind::Child {
            name,
            status,
            child_path,
        } => EventKind::Child(ChildUpdateEvent {
            name,
            status,
            child_path,
        }),
        DeployMessageKind::Link {
            name,
            status,
            child_path,
        } => EventKind::Link(LinkUpdateEvent {
            name,
            status,
            child_path,
        }),
        DeployMessageKind::DeploymentUpdate { status, .. } => {
            EventKind::InstanceUpdate(InstanceUpdateEvent { instance_id, status })
        }
        DeployMessageKind::Finish { status } => return Some(status),
        DeployMessageKind::Exports { .. } => unreachable!("handled above"),
    };

    let event = Event::new(ctx.id_generator.next_id(), ChannelType::Deployment, instance_id, kind, now, false);
    let _ = ctx.save_event(event).await;
    None
}

async fn emit_terminal_error(ctx: &EngineContext, instance_id: ResourceId, message: &str) {
    tracing::warn!(instance_id = %instance_id, error = %message, "deployment worker terminating with error");
    let event = Event::new(
        ctx.id_generator.next_id(),
        ChannelType::Deployment,
        instance_id,
        EventKind::Error(ErrorEvent {
            message: message.to_string(),
            diagnostics: Vec::new(),
        }),
        ctx.clock.now(),
        true,
    );
    let _ = ctx.save_event(event).await;
}
