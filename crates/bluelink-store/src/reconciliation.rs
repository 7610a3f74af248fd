//! Reconciliation-result store (§4.4, C2).

use async_trait::async_trait;
use bluelink_core::reconciliation::ReconciliationResultRecord;
use bluelink_core::ResourceId;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{DbError, DbResult};

#[async_trait]
pub trait ReconciliationResultStore: Send + Sync {
    async fn create(&self, record: &ReconciliationResultRecord) -> DbResult<()>;
    async fn get(&self, id: ResourceId) -> DbResult<ReconciliationResultRecord>;
    /// The most recent drift check recorded against a changeset — what the
    /// drift gate (§4.4) reads to build a `DriftBlockedResponse`.
    async fn get_latest_for_changeset(&self, changeset_id: ResourceId) -> DbResult<ReconciliationResultRecord>;
    async fn cleanup(&self, threshold: DateTime<Utc>) -> DbResult<u64>;
}

#[derive(sqlx::FromRow)]
struct ReconciliationResultRow {
    id: uuid::Uuid,
    changeset_id: uuid::Uuid,
    instance_id: uuid::Uuid,
    result: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReconciliationResultRow> for ReconciliationResultRecord {
    type Error = DbError;

    fn try_from(row: ReconciliationResultRow) -> Result<Self, Self::Error> {
        Ok(ReconciliationResultRecord {
            id: ResourceId::from_uuid(row.id),
            changeset_id: ResourceId::from_uuid(row.changeset_id),
            instance_id: ResourceId::from_uuid(row.instance_id),
            result: serde_json::from_value(row.result)
                .map_err(|e| DbError::Database(sqlx::Error::Decode(Box::new(e))))?,
            created_at: row.created_at,
        })
    }
}

pub struct PgReconciliationResultStore {
    pool: PgPool,
}

impl PgReconciliationResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconciliationResultStore for PgReconciliationResultStore {
    async fn create(&self, record: &ReconciliationResultRecord) -> DbResult<()> {
        let result = serde_json::to_value(&record.result)
            .map_err(|e| DbError::Database(sqlx::Error::Encode(Box::new(e))))?;
        sqlx::query(
            r#"
            INSERT INTO reconciliation_results (id, changeset_id, instance_id, result, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.changeset_id.as_uuid())
        .bind(record.instance_id.as_uuid())
        .bind(result)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> DbResult<ReconciliationResultRecord> {
        let row = sqlx::query_as::<_, ReconciliationResultRow>(
            "SELECT * FROM reconciliation_results WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("reconciliation result {id}")))?;
        row.try_into()
    }

    async fn get_latest_for_changeset(&self, changeset_id: ResourceId) -> DbResult<ReconciliationResultRecord> {
        let row = sqlx::query_as::<_, ReconciliationResultRow>(
            "SELECT * FROM reconciliation_results WHERE changeset_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(changeset_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("reconciliation result for changeset {changeset_id}")))?;
        row.try_into()
    }

    async fn cleanup(&self, threshold: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM reconciliation_results WHERE created_at < $1")
            .bind(threshold)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
