//! Changeset store (§4.1, C2). Immutable once terminal; the cleanup
//! coordinator is the only writer that ever deletes rows here.

use async_trait::async_trait;
use bluelink_core::changeset::{BlueprintChanges, Changeset, ChangesetStatus};
use bluelink_core::ResourceId;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{DbError, DbResult};

#[async_trait]
pub trait ChangesetStore: Send + Sync {
    async fn create(&self, changeset: &Changeset) -> DbResult<()>;
    async fn get(&self, id: ResourceId) -> DbResult<Changeset>;
    async fn update_status(
        &self,
        id: ResourceId,
        status: ChangesetStatus,
        changes: Option<&BlueprintChanges>,
    ) -> DbResult<()>;
    async fn cleanup(&self, threshold: DateTime<Utc>) -> DbResult<u64>;
}

#[derive(sqlx::FromRow)]
struct ChangesetRow {
    id: uuid::Uuid,
    instance_id: Option<uuid::Uuid>,
    destroy: bool,
    blueprint_location: String,
    status: serde_json::Value,
    changes: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChangesetRow> for Changeset {
    type Error = DbError;

    fn try_from(row: ChangesetRow) -> Result<Self, Self::Error> {
        Ok(Changeset {
            id: ResourceId::from_uuid(row.id),
            instance_id: row.instance_id.map(ResourceId::from_uuid),
            destroy: row.destroy,
            blueprint_location: row
                .blueprint_location
                .parse()
                .map_err(|e: url::ParseError| DbError::Database(sqlx::Error::Decode(Box::new(e))))?,
            status: serde_json::from_value(row.status)
                .map_err(|e| DbError::Database(sqlx::Error::Decode(Box::new(e))))?,
            changes: serde_json::from_value(row.changes)
                .map_err(|e| DbError::Database(sqlx::Error::Decode(Box::new(e))))?,
            created_at: row.created_at,
        })
    }
}

pub struct PgChangesetStore {
    pool: PgPool,
}

impl PgChangesetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangesetStore for PgChangesetStore {
    async fn create(&self, changeset: &Changeset) -> DbResult<()> {
        let status = serde_json::to_value(&changeset.status)
            .map_err(|e| DbError::Database(sqlx::Error::Encode(Box::new(e))))?;
        let changes = serde_json::to_value(&changeset.changes)
            .map_err(|e| DbError::Database(sqlx::Error::Encode(Box::new(e))))?;
        sqlx::query(
            r#"
            INSERT INTO changesets (id, instance_id, destroy, blueprint_location, status, changes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(changeset.id.as_uuid())
        .bind(changeset.instance_id.map(|id| *id.as_uuid()))
        .bind(changeset.destroy)
        .bind(changeset.blueprint_location.as_str())
        .bind(status)
        .bind(changes)
        .bind(changeset.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> DbResult<Changeset> {
        let row = sqlx::query_as::<_, ChangesetRow>("SELECT * FROM changesets WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("changeset {id}")))?;
        row.try_into()
    }

    async fn update_status(
        &self,
        id: ResourceId,
        status: ChangesetStatus,
        changes: Option<&BlueprintChanges>,
    ) -> DbResult<()> {
        let status = serde_json::to_value(&status)
            .map_err(|e| DbError::Database(sqlx::Error::Encode(Box::new(e))))?;
        if let Some(changes) = changes {
            let changes = serde_json::to_value(changes)
                .map_err(|e| DbError::Database(sqlx::Error::Encode(Box::new(e))))?;
            sqlx::query("UPDATE changesets SET status = $1, changes = $2 WHERE id = $3")
                .bind(status)
                .bind(changes)
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("UPDATE changesets SET status = $1 WHERE id = $2")
                .bind(status)
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn cleanup(&self, threshold: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM changesets WHERE created_at < $1")
            .bind(threshold)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
