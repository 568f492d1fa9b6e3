use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::{debug, error, info};

use crate::device::queue::backend::QueueBackend;
use crate::device::queue::error::QueueError;
use crate::models::reading::{ReadingValue, WearableReading};

/// Readings per UPDATE. Each selected reading binds two variables.
const MARK_CHUNK: usize = 400;

/// On-device queue stored in SQLite.
#[derive(Clone, Debug)]
pub struct SqliteQueueBackend {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct QueuedReadingRow {
    id: String,
    device_id: String,
    metric_type: String,
    value: String,
    unit: Option<String>,
    timestamp: String,
    uploaded: bool,
    revision: i64,
}

impl TryFrom<QueuedReadingRow> for WearableReading {
    type Error = QueueError;

    fn try_from(row: QueuedReadingRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| QueueError::Corrupt { id: row.id.clone(), reason };

        let value: ReadingValue = serde_json::from_str(&row.value)
            .map_err(|e| corrupt(format!("value: {e}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| corrupt(format!("timestamp: {e}")))?
            .with_timezone(&Utc);

        Ok(WearableReading {
            id: row.id,
            device_id: row.device_id,
            metric_type: row.metric_type,
            value,
            unit: row.unit,
            timestamp,
            uploaded: row.uploaded,
            revision: u64::try_from(row.revision).unwrap_or(0),
        })
    }
}

impl SqliteQueueBackend {
    /// Open (creating if needed) the queue database at `url`,
    /// e.g. `sqlite://veri-queue.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        info!("Opening SQLite reading queue at: {url}");

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| QueueError::Open(format!("Invalid queue database url: {e}")))?
            .create_if_missing(true);

        // A single long-lived connection keeps `sqlite::memory:` databases alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to open SQLite queue at {url}: {e}");
                QueueError::Open(format!("Failed to open SQLite database: {e}"))
            })?;

        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self, QueueError> {
        Self::connect("sqlite::memory:").await
    }
}

#[async_trait]
impl QueueBackend for SqliteQueueBackend {
    async fn initialize(&self) -> Result<(), QueueError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wearable_readings (
                id TEXT PRIMARY KEY,
                device_id TEXT NOT NULL,
                metric_type TEXT NOT NULL,
                value TEXT NOT NULL,
                unit TEXT,
                timestamp TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                uploaded INTEGER NOT NULL DEFAULT 0,
                revision INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create wearable_readings table: {e}");
            QueueError::Open(format!("Failed to create wearable_readings table: {e}"))
        })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_wearable_readings_pending
                ON wearable_readings(uploaded, timestamp_ms)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::Open(format!("Failed to create pending index: {e}")))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sync_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::Open(format!("Failed to create sync_state table: {e}")))?;

        debug!("SQLite reading queue schema ready");
        Ok(())
    }

    async fn upsert(&self, reading: &WearableReading) -> Result<(), QueueError> {
        let value = serde_json::to_string(&reading.value)
            .map_err(|e| QueueError::Operation(format!("Failed to serialize value: {e}")))?;

        sqlx::query(
            "INSERT INTO wearable_readings
                (id, device_id, metric_type, value, unit, timestamp, timestamp_ms, uploaded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
             ON CONFLICT(id) DO UPDATE SET
                device_id = excluded.device_id,
                metric_type = excluded.metric_type,
                value = excluded.value,
                unit = excluded.unit,
                timestamp = excluded.timestamp,
                timestamp_ms = excluded.timestamp_ms,
                uploaded = 0,
                revision = wearable_readings.revision + 1,
                updated_at = datetime('now')",
        )
        .bind(&reading.id)
        .bind(&reading.device_id)
        .bind(&reading.metric_type)
        .bind(value)
        .bind(&reading.unit)
        .bind(reading.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(reading.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!("Queued reading {}", reading.id);
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<WearableReading>, QueueError> {
        let rows = sqlx::query_as::<_, QueuedReadingRow>(
            "SELECT id, device_id, metric_type, value, unit, timestamp, uploaded, revision
             FROM wearable_readings
             WHERE uploaded = 0
             ORDER BY timestamp_ms ASC, id ASC
             LIMIT ?1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WearableReading::try_from).collect()
    }

    async fn mark_uploaded(&self, ids: &[String]) -> Result<u64, QueueError> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for chunk in ids.chunks(MARK_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("UPDATE wearable_readings SET uploaded = 1 WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            updated += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn mark_selected_uploaded(&self, selected: &[WearableReading]) -> Result<u64, QueueError> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for chunk in selected.chunks(MARK_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("UPDATE wearable_readings SET uploaded = 1 WHERE ");
            for (i, reading) in chunk.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder
                    .push("(id = ")
                    .push_bind(&reading.id)
                    .push(" AND revision = ")
                    .push_bind(i64::try_from(reading.revision).unwrap_or(i64::MAX))
                    .push(")");
            }
            updated += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn pending_count(&self) -> Result<u64, QueueError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wearable_readings WHERE uploaded = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<(), QueueError> {
        sqlx::query(
            "INSERT INTO sync_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>, QueueError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM sync_state WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }
}
