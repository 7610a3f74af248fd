//! In-memory store fakes, available to this workspace's own integration
//! tests without a real postgres instance — the same role `FixedClock`
//! plays for `Clock`.

use async_trait::async_trait;
use bluelink_core::changeset::{BlueprintChanges, Changeset, ChangesetStatus};
use bluelink_core::cleanup::CleanupOperation;
use bluelink_core::event::{ChannelType, Event};
use bluelink_core::id::EventId;
use bluelink_core::instance::Instance;
use bluelink_core::reconciliation::ReconciliationResultRecord;
use bluelink_core::ResourceId;
use bluelink_store::{ChangesetStore, CleanupOperationStore, DbError, DbResult, EventStore, InstanceStore, ReconciliationResultStore};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryEventStore {
    events: Mutex<Vec<Event>>,
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save(&self, event: &Event) -> DbResult<()> {
        self.events.lock().expect("poisoned").push(event.clone());
        Ok(())
    }

    async fn get_last_event_id(
        &self,
        channel_type: ChannelType,
        channel_id: ResourceId,
    ) -> DbResult<Option<EventId>> {
        Ok(self
            .events
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|e| e.channel_type == channel_type && e.channel_id == channel_id)
            .map(|e| e.id)
            .max())
    }

    async fn replay_since(
        &self,
        channel_type: ChannelType,
        channel_id: ResourceId,
        cursor: Option<EventId>,
    ) -> DbResult<Vec<Event>> {
        let mut matching: Vec<Event> = self
            .events
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|e| {
                e.channel_type == channel_type
                    && e.channel_id == channel_id
                    && cursor.map(|c| e.id > c).unwrap_or(true)
            })
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.id);
        Ok(matching)
    }

    async fn cleanup(&self, threshold: chrono::DateTime<chrono::Utc>) -> DbResult<u64> {
        let mut events = self.events.lock().expect("poisoned");
        let before = events.len();
        events.retain(|e| e.timestamp >= threshold);
        Ok((before - events.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryChangesetStore {
    changesets: Mutex<HashMap<ResourceId, Changeset>>,
}

#[async_trait]
impl ChangesetStore for InMemoryChangesetStore {
    async fn create(&self, changeset: &Changeset) -> DbResult<()> {
        self.changesets
            .lock()
            .expect("poisoned")
            .insert(changeset.id, changeset.clone());
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> DbResult<Changeset> {
        self.changesets
            .lock()
            .expect("poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("changeset {id}")))
    }

    async fn update_status(
        &self,
        id: ResourceId,
        status: ChangesetStatus,
        changes: Option<&BlueprintChanges>,
    ) -> DbResult<()> {
        let mut changesets = self.changesets.lock().expect("poisoned");
        let changeset = changesets
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("changeset {id}")))?;
        changeset.status = status;
        if let Some(changes) = changes {
            changeset.changes = Some(changes.clone());
        }
        Ok(())
    }

    async fn cleanup(&self, threshold: chrono::DateTime<chrono::Utc>) -> DbResult<u64> {
        let mut changesets = self.changesets.lock().expect("poisoned");
        let before = changesets.len();
        changesets.retain(|_, c| c.created_at >= threshold);
        Ok((before - changesets.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryReconciliationResultStore {
    records: Mutex<HashMap<ResourceId, ReconciliationResultRecord>>,
}

#[async_trait]
impl ReconciliationResultStore for InMemoryReconciliationResultStore {
    async fn create(&self, record: &ReconciliationResultRecord) -> DbResult<()> {
        self.records
            .lock()
            .expect("poisoned")
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> DbResult<ReconciliationResultRecord> {
        self.records
            .lock()
            .expect("poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("reconciliation result {id}")))
    }

    async fn get_latest_for_changeset(&self, changeset_id: ResourceId) -> DbResult<ReconciliationResultRecord> {
        self.records
            .lock()
            .expect("poisoned")
            .values()
            .filter(|r| r.changeset_id == changeset_id)
            .max_by_key(|r| r.created_at)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("reconciliation result for changeset {changeset_id}")))
    }

    async fn cleanup(&self, threshold: chrono::DateTime<chrono::Utc>) -> DbResult<u64> {
        let mut records = self.records.lock().expect("poisoned");
        let before = records.len();
        records.retain(|_, r| r.created_at >= threshold);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryCleanupOperationStore {
    operations: Mutex<HashMap<ResourceId, CleanupOperation>>,
}

#[async_trait]
impl CleanupOperationStore for InMemoryCleanupOperationStore {
    async fn create(&self, op: &CleanupOperation) -> DbResult<()> {
        self.operations.lock().expect("poisoned").insert(op.id, op.clone());
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> DbResult<CleanupOperation> {
        self.operations
            .lock()
            .expect("poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("cleanup operation {id}")))
    }

    async fn update(&self, op: &CleanupOperation) -> DbResult<()> {
        self.operations.lock().expect("poisoned").insert(op.id, op.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryInstanceStore {
    instances: Mutex<HashMap<ResourceId, (Instance, i64)>>,
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn create(&self, instance: &Instance) -> DbResult<()> {
        self.instances
            .lock()
            .expect("poisoned")
            .insert(instance.id, (instance.clone(), 1));
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> DbResult<(Instance, i64)> {
        self.instances
            .lock()
            .expect("poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("instance {id}")))
    }

    async fn list(&self, name_contains: Option<&str>, limit: i64) -> DbResult<Vec<Instance>> {
        let instances = self.instances.lock().expect("poisoned");
        let mut matching: Vec<Instance> = instances
            .values()
            .filter(|(instance, _)| {
                name_contains
                    .map(|needle| instance.name.contains(needle))
                    .unwrap_or(true)
            })
            .map(|(instance, _)| instance.clone())
            .collect();
        matching.sort_by_key(|i| i.created_at);
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn compare_and_swap(&self, instance: &Instance, expected_version: i64) -> DbResult<i64> {
        let mut instances = self.instances.lock().expect("poisoned");
        let (_, current_version) = instances
            .get(&instance.id)
            .ok_or_else(|| DbError::NotFound(format!("instance {}", instance.id)))?;
        if *current_version != expected_version {
            return Err(DbError::Conflict(format!(
                "instance {} was modified concurrently",
                instance.id
            )));
        }
        let next_version = expected_version + 1;
        instances.insert(instance.id, (instance.clone(), next_version));
        Ok(next_version)
    }
}
