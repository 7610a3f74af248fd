//! Instance state store (§5). Provides optimistic compare-and-swap so that
//! two workers racing on the same instance id surface a conflict instead of
//! silently clobbering each other's write — the engine layer relies on this
//! instead of taking its own cross-process lock.

use async_trait::async_trait;
use bluelink_core::instance::Instance;
use bluelink_core::ResourceId;
use sqlx::PgPool;

use crate::error::{DbError, DbResult};

#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn create(&self, instance: &Instance) -> DbResult<()>;
    async fn get(&self, id: ResourceId) -> DbResult<(Instance, i64)>;
    async fn list(&self, name_contains: Option<&str>, limit: i64) -> DbResult<Vec<Instance>>;

    /// Persist `instance`, succeeding only if the row's current version
    /// still equals `expected_version`. Returns the new version on success,
    /// or `DbError::Conflict` if another writer updated it first.
    async fn compare_and_swap(&self, instance: &Instance, expected_version: i64) -> DbResult<i64>;
}

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: uuid::Uuid,
    name: String,
    status: serde_json::Value,
    resources: serde_json::Value,
    links: serde_json::Value,
    children: serde_json::Value,
    exports: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    version: i64,
}

impl TryFrom<InstanceRow> for (Instance, i64) {
    type Error = DbError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        let decode = |e: serde_json::Error| DbError::Database(sqlx::Error::Decode(Box::new(e)));
        let instance = Instance {
            id: ResourceId::from_uuid(row.id),
            name: row.name,
            status: serde_json::from_value(row.status).map_err(decode)?,
            resources: serde_json::from_value(row.resources).map_err(decode)?,
            links: serde_json::from_value(row.links).map_err(decode)?,
            children: serde_json::from_value(row.children).map_err(decode)?,
            exports: serde_json::from_value(row.exports).map_err(decode)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        Ok((instance, row.version))
    }
}

pub struct PgInstanceStore {
    pool: PgPool,
}

impl PgInstanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_json(
    value: &impl serde::Serialize,
) -> DbResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| DbError::Database(sqlx::Error::Encode(Box::new(e))))
}

#[async_trait]
impl InstanceStore for PgInstanceStore {
    async fn create(&self, instance: &Instance) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO instances
                (id, name, status, resources, links, children, exports, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1)
            "#,
        )
        .bind(instance.id.as_uuid())
        .bind(&instance.name)
        .bind(to_json(&instance.status)?)
        .bind(to_json(&instance.resources)?)
        .bind(to_json(&instance.links)?)
        .bind(to_json(&instance.children)?)
        .bind(to_json(&instance.exports)?)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> DbResult<(Instance, i64)> {
        let row = sqlx::query_as::<_, InstanceRow>("SELECT * FROM instances WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("instance {id}")))?;
        row.try_into()
    }

    async fn list(&self, name_contains: Option<&str>, limit: i64) -> DbResult<Vec<Instance>> {
        let rows = match name_contains {
            Some(needle) => {
                sqlx::query_as::<_, InstanceRow>(
                    "SELECT * FROM instances WHERE name ILIKE $1 ORDER BY created_at DESC LIMIT $2",
                )
                .bind(format!("%{needle}%"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, InstanceRow>(
                    "SELECT * FROM instances ORDER BY created_at DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter()
            .map(|row| <(Instance, i64)>::try_from(row).map(|(instance, _)| instance))
            .collect()
    }

    async fn compare_and_swap(&self, instance: &Instance, expected_version: i64) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            UPDATE instances
            SET name = $1, status = $2, resources = $3, links = $4, children = $5,
                exports = $6, updated_at = $7, version = version + 1
            WHERE id = $8 AND version = $9
            "#,
        )
        .bind(&instance.name)
        .bind(to_json(&instance.status)?)
        .bind(to_json(&instance.resources)?)
        .bind(to_json(&instance.links)?)
        .bind(to_json(&instance.children)?)
        .bind(to_json(&instance.exports)?)
        .bind(instance.updated_at)
        .bind(instance.id.as_uuid())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict(format!(
                "instance {} was modified concurrently",
                instance.id
            )));
        }
        Ok(expected_version + 1)
    }
}
