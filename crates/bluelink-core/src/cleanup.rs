//! Cleanup (retention GC) operation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CleanupType {
    Validations,
    Changesets,
    ReconciliationResults,
    Events,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CleanupStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupOperation {
    pub id: ResourceId,
    pub cleanup_type: CleanupType,
    pub status: CleanupStatus,
    pub threshold: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub items_deleted: Option<u64>,
    pub error_message: Option<String>,
}

impl CleanupOperation {
    pub fn start(id: ResourceId, cleanup_type: CleanupType, threshold: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            cleanup_type,
            status: CleanupStatus::Running,
            threshold,
            started_at: now,
            ended_at: None,
            items_deleted: None,
            error_message: None,
        }
    }

    pub fn complete(&mut self, items_deleted: u64, now: DateTime<Utc>) {
        self.status = CleanupStatus::Completed;
        self.items_deleted = Some(items_deleted);
        self.ended_at = Some(now);
    }

    pub fn fail(&mut self, message: String, now: DateTime<Utc>) {
        self.status = CleanupStatus::Failed;
        self.error_message = Some(message);
        self.ended_at = Some(now);
    }
}
