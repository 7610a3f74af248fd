//! Changeset engine (§4.3, C3): computes and persists a staged diff between
//! a blueprint and a target instance, driving the blueprint container's
//! `StageChanges` channels and forwarding each message as an event.

use std::sync::Arc;

use bluelink_core::changeset::{Changeset, ChangesetStatus};
use bluelink_core::container::{
    CallerParams, OperationInput, StageChangesMessage, StageMessageKind,
};
use bluelink_core::event::{ChannelType, Event, EventKind};
use bluelink_core::event::{
    ChangeStagingCompleteEvent, ChildChangeEvent, DriftDetectedEvent, ErrorEvent, LinkChangeEvent,
    ResourceChangeEvent,
};
use bluelink_core::reconciliation::{CheckReconciliationInput, ReconciliationResultRecord};
use bluelink_core::{Error, ResourceId, Result};

use crate::context::{EngineContext, CHANGESET_WORKER_TIMEOUT};

pub struct StartStagingInput {
    pub instance_id: Option<ResourceId>,
    pub destroy: bool,
    pub blueprint_location: url::Url,
    pub params: CallerParams,
    pub skip_drift_check: bool,
}

pub struct ChangesetEngine {
    ctx: Arc<EngineContext>,
}

impl ChangesetEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Synchronous phase: persist the starting changeset and spawn the
    /// background worker. Returns the record as it should appear in the
    /// 202 response, plus the cursor a client should resume streaming from.
    pub async fn start_staging(&self, input: StartStagingInput) -> Result<Changeset> {
        let changeset = Changeset::new_starting(
            ResourceId::new(),
            input.instance_id,
            input.destroy,
            input.blueprint_location.clone(),
            self.ctx.clock.now(),
        );
        self.ctx
            .changesets
            .create(&changeset)
            .await
            .map_err(Error::from)?;

        let ctx = self.ctx.clone();
        let changeset_id = changeset.id;
        let instance_id = input.instance_id;
        let location = input.blueprint_location;
        let params = input.params;
        let destroy = input.destroy;
        let skip_drift_check = input.skip_drift_check;

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                CHANGESET_WORKER_TIMEOUT,
                run_staging_worker(
                    &ctx,
                    changeset_id,
                    instance_id,
                    &location,
                    params,
                    destroy,
                    skip_drift_check,
                ),
            )
            .await;

            if outcome.is_err() {
                emit_terminal_error(&ctx, changeset_id, "changeset worker timed out").await;
            }
        });

        Ok(changeset)
    }
}

async fn run_staging_worker(
    ctx: &EngineContext,
    changeset_id: ResourceId,
    instance_id: Option<ResourceId>,
    location: &url::Url,
    params: CallerParams,
    destroy: bool,
    skip_drift_check: bool,
) {
    let container = match ctx.container_loader.load(location, &params).await {
        Ok(container) => container,
        Err(e) => {
            emit_terminal_error(ctx, changeset_id, &e.to_string()).await;
            let _ = ctx
                .changesets
                .update_status(changeset_id, ChangesetStatus::Failed, None)
                .await;
            return;
        }
    };

    if let Some(instance_id) = instance_id {
        if !skip_drift_check {
            let check = container
                .check_reconciliation(CheckReconciliationInput::new(instance_id))
                .await;
            match check {
                Ok(result) if result.blocks_operation() => {
                    let record = ReconciliationResultRecord {
                        id: ResourceId::new(),
                        changeset_id,
                        instance_id,
                        result: result.clone(),
                        created_at: ctx.clock.now(),
                    };
                    if let Err(e) = ctx.reconciliation_results.create(&record).await {
                        emit_terminal_error(ctx, changeset_id, &e.to_string()).await;
                        return;
                    }
                    let event = Event::new(
                        ctx.id_generator.next_id(),
                        ChannelType::Changeset,
                        changeset_id,
                        EventKind::DriftDetected(DriftDetectedEvent { result }),
                        ctx.clock.now(),
                        true,
                    );
                    if ctx.save_event(event).await.is_err() {
                        return;
                    }
                    let _ = ctx
                        .changesets
                        .update_status(changeset_id, ChangesetStatus::DriftDetected, None)
                        .await;
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    emit_terminal_error(ctx, changeset_id, &e.to_string()).await;
                    let _ = ctx
                        .changesets
                        .update_status(changeset_id, ChangesetStatus::Failed, None)
                        .await;
                    return;
                }
            }
        }
    }

    let mut channels = match container
        .stage_changes(OperationInput {
            instance_id,
            destroy,
            params,
        })
        .await
    {
        Ok(channels) => channels,
        Err(e) => {
            emit_terminal_error(ctx, changeset_id, &e.to_string()).await;
            let _ = ctx
                .changesets
                .update_status(changeset_id, ChangesetStatus::Failed, None)
                .await;
            return;
        }
    };

    loop {
        tokio::select! {
            message = channels.messages.recv() => {
                match message {
                    Some(message) => {
                        if !forward_stage_message(ctx, changeset_id, message).await {
                            return;
                        }
                    }
                    None => return,
                }
            }
            error = channels.errors.recv() => {
                if let Some(error) = error {
                    emit_terminal_error(ctx, changeset_id, &error).await;
                    let _ = ctx
                        .changesets
                        .update_status(changeset_id, ChangesetStatus::Failed, None)
                        .await;
                    return;
                }
            }
        }
    }
}

/// Forward one staging message as an event. Returns `false` once the
/// terminal `changeStagingComplete` event has been written, telling the
/// caller loop to stop.
async fn forward_stage_message(
    ctx: &EngineContext,
    changeset_id: ResourceId,
    message: StageChangesMessage,
) -> bool {
    let now = ctx.clock.now();
    let (kind, end) = match message.kind {
        StageMessageKind::ResourceChange {
            name,
            resource_type,
            change_kind,
        } => (
            EventKind::ResourceChanges(ResourceChangeEvent {
                name,
                resource_type,
                kind: change_kind,
            }),
            false,
        ),
        StageMessageKind::ChildChange { name, change_kind } => (
            EventKind::ChildChanges(ChildChangeEvent {
                name,
                kind: change_kind,
            }),
            false,
        ),
        StageMessageKind::LinkChange { name, change_kind } => (
            EventKind::LinkChanges(LinkChangeEvent {
                name,
                kind: change_kind,
            }),
            false,
        ),
        StageMessageKind::Complete { changes } => {
            let event = Event::new(
                ctx.id_generator.next_id(),
                ChannelType::Changeset,
                changeset_id,
                EventKind::ChangeStagingComplete(ChangeStagingCompleteEvent {
                    changes: changes.clone(),
                }),
                now,
                true,
            );
            if ctx.save_event(event).await.is_err() {
                return false;
            }
            let _ = ctx
                .changesets
                .update_status(changeset_id, ChangesetStatus::ChangesStaged, Some(&changes))
                .await;
            return false;
        }
    };

    let event = Event::new(
        ctx.id_generator.next_id(),
        ChannelType::Changeset,
        changeset_id,
        kind,
        now,
        end,
    );
    ctx.save_event(event).await.is_ok()
}

async fn emit_terminal_error(ctx: &EngineContext, changeset_id: ResourceId, message: &str) {
    tracing::warn!(changeset_id = %changeset_id, error = %message, "changeset worker terminating with error");
    let event = Event::new(
        ctx.id_generator.next_id(),
        ChannelType::Changeset,
        changeset_id,
        EventKind::Error(ErrorEvent {
            message: message.to_string(),
            diagnostics: Vec::new(),
        }),
        ctx.clock.now(),
        true,
    );
    let _ = ctx.save_event(event).await;
}
