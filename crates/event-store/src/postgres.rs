use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version, WireEvent,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const VERSION_CONSTRAINT: &str = "crop_events_aggregate_version_key";

const SELECT_COLUMNS: &str =
    "SELECT id, aggregate_id, aggregate_type, version, created_at, event, metadata FROM crop_events";

/// Event store backed by the `crop_events` table.
///
/// The persisted `event` column holds the `{"Name", "Data"}` body; the
/// `(aggregate_id, version)` pair is unique, which backs the version check
/// when two writers race inside their transactions.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the workspace migrations (event log and read-model tables).
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let wire: WireEvent = serde_json::from_value(row.try_get("event")?)?;
        let metadata: HashMap<String, serde_json::Value> =
            serde_json::from_value(row.try_get("metadata")?)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: wire.name,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            data: wire.data,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events, options)?;

        let aggregate_id = events[0].aggregate_id;
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM crop_events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let actual = Version::new(current.unwrap_or(0));

        if actual != options.expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version,
                actual,
            });
        }

        let mut last_version = options.expected_version;
        for event in &events {
            let body = serde_json::to_value(event.to_wire())?;
            let metadata = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO crop_events (id, aggregate_id, aggregate_type, version, created_at, event, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.created_at)
            .bind(body)
            .bind(metadata)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent writer committed the same version first.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some(VERSION_CONSTRAINT)
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: options.expected_version,
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;

            last_version = event.version;
        }

        tx.commit().await?;
        metrics::counter!("event_store_events_appended").increment(events.len() as u64);
        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE aggregate_id = $1 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE aggregate_id = $1 AND version >= $2 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY position ASC"))
            .fetch_all(&self.pool)
            .await?;
        let events: Vec<Result<EventEnvelope>> =
            rows.into_iter().map(Self::row_to_event).collect();

        Ok(Box::pin(stream::iter(events)))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM crop_events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
