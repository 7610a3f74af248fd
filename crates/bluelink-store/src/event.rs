//! Append-only event log store (§4.2, C1).
//!
//! Persistence only: `save`, `get_last_event_id`, `replay_since` and
//! `cleanup`. Live tailing past the most recently persisted event is a
//! job for an in-process broadcaster sitting above this store (see
//! `bluelink-engine::broadcast`), since a single-process service has no
//! need for `LISTEN`/`NOTIFY` round-trips to learn about its own writes.

use async_trait::async_trait;
use bluelink_core::event::{ChannelType, Event, EventKind};
use bluelink_core::id::EventId;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{DbError, DbResult};

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn save(&self, event: &Event) -> DbResult<()>;
    async fn get_last_event_id(
        &self,
        channel_type: ChannelType,
        channel_id: bluelink_core::ResourceId,
    ) -> DbResult<Option<EventId>>;
    async fn replay_since(
        &self,
        channel_type: ChannelType,
        channel_id: bluelink_core::ResourceId,
        cursor: Option<EventId>,
    ) -> DbResult<Vec<Event>>;
    async fn cleanup(&self, threshold: DateTime<Utc>) -> DbResult<u64>;
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: uuid::Uuid,
    channel_type: String,
    channel_id: uuid::Uuid,
    kind: serde_json::Value,
    timestamp: DateTime<Utc>,
    end: bool,
}

impl TryFrom<EventRow> for Event {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let channel_type = match row.channel_type.as_str() {
            "changeset" => ChannelType::Changeset,
            "deployment" => ChannelType::Deployment,
            other => {
                return Err(DbError::Database(sqlx::Error::Decode(
                    format!("unknown channel_type {other}").into(),
                )));
            }
        };
        let kind: EventKind = serde_json::from_value(row.kind)
            .map_err(|e| DbError::Database(sqlx::Error::Decode(Box::new(e))))?;
        Ok(Event {
            id: EventId::from_uuid(row.id),
            channel_type,
            channel_id: bluelink_core::ResourceId::from_uuid(row.channel_id),
            kind,
            timestamp: row.timestamp,
            end: row.end,
        })
    }
}

pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn save(&self, event: &Event) -> DbResult<()> {
        let kind = serde_json::to_value(&event.kind)
            .map_err(|e| DbError::Database(sqlx::Error::Encode(Box::new(e))))?;
        sqlx::query(
            r#"
            INSERT INTO events (id, channel_type, channel_id, kind, timestamp, "end")
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.channel_type.to_string())
        .bind(event.channel_id.as_uuid())
        .bind(kind)
        .bind(event.timestamp)
        .bind(event.end)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_last_event_id(
        &self,
        channel_type: ChannelType,
        channel_id: bluelink_core::ResourceId,
    ) -> DbResult<Option<EventId>> {
        let row: Option<(uuid::Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM events
            WHERE channel_type = $1 AND channel_id = $2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(channel_type.to_string())
        .bind(channel_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| EventId::from_uuid(id)))
    }

    async fn replay_since(
        &self,
        channel_type: ChannelType,
        channel_id: bluelink_core::ResourceId,
        cursor: Option<EventId>,
    ) -> DbResult<Vec<Event>> {
        let rows = match cursor {
            Some(cursor) => {
                sqlx::query_as::<_, EventRow>(
                    r#"
                    SELECT id, channel_type, channel_id, kind, timestamp, "end"
                    FROM events
                    WHERE channel_type = $1 AND channel_id = $2 AND id > $3
                    ORDER BY id ASC
                    "#,
                )
                .bind(channel_type.to_string())
                .bind(channel_id.as_uuid())
                .bind(cursor.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, EventRow>(
                    r#"
                    SELECT id, channel_type, channel_id, kind, timestamp, "end"
                    FROM events
                    WHERE channel_type = $1 AND channel_id = $2
                    ORDER BY id ASC
                    "#,
                )
                .bind(channel_type.to_string())
                .bind(channel_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(Event::try_from).collect()
    }

    async fn cleanup(&self, threshold: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM events WHERE timestamp < $1")
            .bind(threshold)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
