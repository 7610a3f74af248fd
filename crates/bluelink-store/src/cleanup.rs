//! Cleanup operation store (§4.7, C2).

use async_trait::async_trait;
use bluelink_core::cleanup::{CleanupOperation, CleanupStatus, CleanupType};
use bluelink_core::ResourceId;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{DbError, DbResult};

#[async_trait]
pub trait CleanupOperationStore: Send + Sync {
    async fn create(&self, op: &CleanupOperation) -> DbResult<()>;
    async fn get(&self, id: ResourceId) -> DbResult<CleanupOperation>;
    async fn update(&self, op: &CleanupOperation) -> DbResult<()>;
}

#[derive(sqlx::FromRow)]
struct CleanupOperationRow {
    id: uuid::Uuid,
    cleanup_type: String,
    status: String,
    threshold: DateTime<Utc>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    items_deleted: Option<i64>,
    error_message: Option<String>,
}

fn cleanup_type_to_str(t: CleanupType) -> &'static str {
    match t {
        CleanupType::Validations => "validations",
        CleanupType::Changesets => "changesets",
        CleanupType::ReconciliationResults => "reconciliationResults",
        CleanupType::Events => "events",
    }
}

fn cleanup_type_from_str(s: &str) -> DbResult<CleanupType> {
    Ok(match s {
        "validations" => CleanupType::Validations,
        "changesets" => CleanupType::Changesets,
        "reconciliationResults" => CleanupType::ReconciliationResults,
        "events" => CleanupType::Events,
        other => {
            return Err(DbError::Database(sqlx::Error::Decode(
                format!("unknown cleanup_type {other}").into(),
            )));
        }
    })
}

fn status_to_str(s: CleanupStatus) -> &'static str {
    match s {
        CleanupStatus::Running => "running",
        CleanupStatus::Completed => "completed",
        CleanupStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> DbResult<CleanupStatus> {
    Ok(match s {
        "running" => CleanupStatus::Running,
        "completed" => CleanupStatus::Completed,
        "failed" => CleanupStatus::Failed,
        other => {
            return Err(DbError::Database(sqlx::Error::Decode(
                format!("unknown cleanup status {other}").into(),
            )));
        }
    })
}

impl TryFrom<CleanupOperationRow> for CleanupOperation {
    type Error = DbError;

    fn try_from(row: CleanupOperationRow) -> Result<Self, Self::Error> {
        Ok(CleanupOperation {
            id: ResourceId::from_uuid(row.id),
            cleanup_type: cleanup_type_from_str(&row.cleanup_type)?,
            status: status_from_str(&row.status)?,
            threshold: row.threshold,
            started_at: row.started_at,
            ended_at: row.ended_at,
            items_deleted: row.items_deleted.map(|n| n as u64),
            error_message: row.error_message,
        })
    }
}

pub struct PgCleanupOperationStore {
    pool: PgPool,
}

impl PgCleanupOperationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CleanupOperationStore for PgCleanupOperationStore {
    async fn create(&self, op: &CleanupOperation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cleanup_operations
                (id, cleanup_type, status, threshold, started_at, ended_at, items_deleted, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(op.id.as_uuid())
        .bind(cleanup_type_to_str(op.cleanup_type))
        .bind(status_to_str(op.status))
        .bind(op.threshold)
        .bind(op.started_at)
        .bind(op.ended_at)
        .bind(op.items_deleted.map(|n| n as i64))
        .bind(&op.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> DbResult<CleanupOperation> {
        let row = sqlx::query_as::<_, CleanupOperationRow>(
            "SELECT * FROM cleanup_operations WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("cleanup operation {id}")))?;
        row.try_into()
    }

    async fn update(&self, op: &CleanupOperation) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE cleanup_operations
            SET status = $1, ended_at = $2, items_deleted = $3, error_message = $4
            WHERE id = $5
            "#,
        )
        .bind(status_to_str(op.status))
        .bind(op.ended_at)
        .bind(op.items_deleted.map(|n| n as i64))
        .bind(&op.error_message)
        .bind(op.id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
