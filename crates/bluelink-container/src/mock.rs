use async_trait::async_trait;
use bluelink_core::changeset::BlueprintChanges;
use bluelink_core::container::{
    BlueprintContainer, BlueprintContainerLoader, BlueprintFormat, CallerParams, DeployChannels,
    DeployMessageKind, OperationInput, StageChangesMessage, StageChannels, StageMessageKind,
};
use bluelink_core::reconciliation::{
    ApplyReconciliationInput, ApplyReconciliationResult, CheckReconciliationInput,
    ReconciliationCheckResult,
};
use bluelink_core::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 64;

/// A container whose every operation replays a fixed script instead of
/// evaluating a real blueprint. Build one with [`MockBlueprintContainer::builder`]
/// and feed it the exact messages a test scenario needs.
#[derive(Clone, Default)]
pub struct MockBlueprintContainer {
    inner: Arc<Script>,
}

#[derive(Default)]
struct Script {
    stage_messages: Vec<StageChangesMessage>,
    stage_error: Option<String>,
    deploy_messages: Vec<DeployMessageKind>,
    deploy_error: Option<String>,
    destroy_messages: Vec<DeployMessageKind>,
    destroy_error: Option<String>,
    reconciliation_result: Mutex<Option<ReconciliationCheckResult>>,
    apply_result: Mutex<Option<ApplyReconciliationResult>>,
    deploy_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
}

#[derive(Default)]
pub struct MockBlueprintContainerBuilder {
    script: Script,
}

impl MockBlueprintContainerBuilder {
    pub fn with_stage_changes(mut self, messages: Vec<StageChangesMessage>) -> Self {
        self.script.stage_messages = messages;
        self
    }

    pub fn with_stage_error(mut self, message: impl Into<String>) -> Self {
        self.script.stage_error = Some(message.into());
        self
    }

    pub fn with_deploy(mut self, messages: Vec<DeployMessageKind>) -> Self {
        self.script.deploy_messages = messages;
        self
    }

    pub fn with_deploy_error(mut self, message: impl Into<String>) -> Self {
        self.script.deploy_error = Some(message.into());
        self
    }

    pub fn with_destroy(mut self, messages: Vec<DeployMessageKind>) -> Self {
        self.script.destroy_messages = messages;
        self
    }

    pub fn with_destroy_error(mut self, message: impl Into<String>) -> Self {
        self.script.destroy_error = Some(message.into());
        self
    }

    pub fn with_reconciliation_result(mut self, result: ReconciliationCheckResult) -> Self {
        self.script.reconciliation_result = Mutex::new(Some(result));
        self
    }

    pub fn with_apply_result(mut self, result: ApplyReconciliationResult) -> Self {
        self.script.apply_result = Mutex::new(Some(result));
        self
    }

    pub fn build(self) -> MockBlueprintContainer {
        MockBlueprintContainer {
            inner: Arc::new(self.script),
        }
    }
}

impl MockBlueprintContainer {
    pub fn builder() -> MockBlueprintContainerBuilder {
        MockBlueprintContainerBuilder::default()
    }

    /// A single `New`-kind resource change followed by `Complete`, the
    /// shape used by a first-time deploy's happy-path staging (§8 scenario 1).
    pub fn single_new_resource(name: &str, resource_type: &str) -> StageChangesMessage {
        StageChangesMessage {
            kind: StageMessageKind::ResourceChange {
                name: name.to_string(),
                resource_type: resource_type.to_string(),
                change_kind: bluelink_core::changeset::ChangeKind::New,
            },
        }
    }

    pub fn complete(changes: BlueprintChanges) -> StageChangesMessage {
        StageChangesMessage {
            kind: StageMessageKind::Complete { changes },
        }
    }

    pub fn deploy_call_count(&self) -> usize {
        self.inner.deploy_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_call_count(&self) -> usize {
        self.inner.destroy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlueprintContainer for MockBlueprintContainer {
    async fn stage_changes(&self, _input: OperationInput) -> Result<StageChannels> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (err_tx, err_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let messages = self.inner.stage_messages.clone();
        let error = self.inner.stage_error.clone();
        tokio::spawn(async move {
            for message in messages {
                if tx.send(message).await.is_err() {
                    return;
                }
            }
            if let Some(error) = error {
                let _ = err_tx.send(error).await;
            }
        });
        Ok(StageChannels {
            messages: rx,
            errors: err_rx,
        })
    }

    async fn deploy(&self, _input: OperationInput) -> Result<DeployChannels> {
        self.inner.deploy_calls.fetch_add(1, Ordering::SeqCst);
        replay(self.inner.deploy_messages.clone(), self.inner.deploy_error.clone())
    }

    async fn destroy(&self, _input: OperationInput) -> Result<DeployChannels> {
        self.inner.destroy_calls.fetch_add(1, Ordering::SeqCst);
        replay(
            self.inner.destroy_messages.clone(),
            self.inner.destroy_error.clone(),
        )
    }

    async fn check_reconciliation(
        &self,
        _input: CheckReconciliationInput,
    ) -> Result<ReconciliationCheckResult> {
        Ok(self
            .inner
            .reconciliation_result
            .lock()
            .expect("mock state mutex poisoned")
            .clone()
            .unwrap_or_default())
    }

    async fn apply_reconciliation(
        &self,
        _input: ApplyReconciliationInput,
    ) -> Result<ApplyReconciliationResult> {
        Ok(self
            .inner
            .apply_result
            .lock()
            .expect("mock state mutex poisoned")
            .clone()
            .unwrap_or_default())
    }
}

fn replay(messages: Vec<DeployMessageKind>, error: Option<String>) -> Result<DeployChannels> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (err_tx, err_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(async move {
        for message in messages {
            if tx.send(message).await.is_err() {
                return;
            }
        }
        if let Some(error) = error {
            let _ = err_tx.send(error).await;
        }
    });
    Ok(DeployChannels {
        messages: rx,
        errors: err_rx,
    })
}

/// Loader that always hands back clones of the same scripted container,
/// regardless of the requested location.
#[derive(Clone)]
pub struct MockBlueprintContainerLoader {
    container: MockBlueprintContainer,
    placeholder: MockBlueprintContainer,
}

impl MockBlueprintContainerLoader {
    pub fn new(container: MockBlueprintContainer) -> Self {
        Self {
            container,
            placeholder: MockBlueprintContainer::default(),
        }
    }

    pub fn with_placeholder(mut self, placeholder: MockBlueprintContainer) -> Self {
        self.placeholder = placeholder;
        self
    }
}

#[async_trait]
impl BlueprintContainerLoader for MockBlueprintContainerLoader {
    async fn load(
        &self,
        _location: &url::Url,
        _params: &CallerParams,
    ) -> Result<Box<dyn BlueprintContainer>> {
        Ok(Box::new(self.container.clone()))
    }

    async fn load_string(
        &self,
        _source: &str,
        _format: BlueprintFormat,
        _params: &CallerParams,
    ) -> Result<Box<dyn BlueprintContainer>> {
        Ok(Box::new(self.container.clone()))
    }

    async fn placeholder(&self) -> Result<Box<dyn BlueprintContainer>> {
        Ok(Box::new(self.placeholder.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluelink_core::container::OperationInput;

    #[tokio::test]
    async fn replays_scripted_stage_messages_in_order() {
        let container = MockBlueprintContainer::builder()
            .with_stage_changes(vec![
                MockBlueprintContainer::single_new_resource("bucket", "s3::Bucket"),
                MockBlueprintContainer::complete(BlueprintChanges::default()),
            ])
            .build();

        let mut channels = container
            .stage_changes(OperationInput {
                instance_id: None,
                destroy: false,
                params: CallerParams::default(),
            })
            .await
            .unwrap();

        let first = channels.messages.recv().await.unwrap();
        assert!(matches!(first.kind, StageMessageKind::ResourceChange { .. }));
        let second = channels.messages.recv().await.unwrap();
        assert!(matches!(second.kind, StageMessageKind::Complete { .. }));
        assert!(channels.messages.recv().await.is_none());
    }

    #[tokio::test]
    async fn check_reconciliation_returns_configured_result() {
        let result = ReconciliationCheckResult {
            has_drift: true,
            ..Default::default()
        };
        let container = MockBlueprintContainer::builder()
            .with_reconciliation_result(result)
            .build();

        let got = container
            .check_reconciliation(CheckReconciliationInput::new(
                bluelink_core::ResourceId::new(),
            ))
            .await
            .unwrap();
        assert!(got.has_drift);
    }
}
