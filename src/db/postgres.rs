use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::db::store::{IngestionStore, StoreError};
use crate::models::device_assignment::DeviceAssignment;
use crate::models::vitals::{AuditRecord, InsertedCounts, StructuredVital};

#[derive(Clone, Debug)]
pub struct PgIngestionStore {
    pool: PgPool,
}

impl PgIngestionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl IngestionStore for PgIngestionStore {
    #[tracing::instrument(name = "Fetch latest device assignments", skip(self))]
    async fn latest_assignments(
        &self,
        device_ids: &[String],
    ) -> Result<HashMap<String, DeviceAssignment>, StoreError> {
        let rows = sqlx::query_as::<_, DeviceAssignment>(
            r#"
            SELECT DISTINCT ON (device_id)
                id, device_id, patient_id, assigned_at, revoked_at
            FROM device_assignments
            WHERE device_id = ANY($1)
            ORDER BY device_id, assigned_at DESC
            "#,
        )
        .bind(device_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Lookup(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|assignment| (assignment.device_id.clone(), assignment))
            .collect())
    }

    #[tracing::instrument(
        name = "Persist wearable batch",
        skip(self, audit, vitals),
        fields(audit_rows = audit.len(), structured_rows = vitals.len())
    )]
    async fn persist_batch(
        &self,
        audit: &[AuditRecord],
        vitals: &[StructuredVital],
    ) -> Result<InsertedCounts, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut counts = InsertedCounts::default();

        for record in audit {
            let result = sqlx::query(
                r#"
                INSERT INTO wearable_audit_log (
                    id, reading_id, device_id, patient_id,
                    metric_type, raw_payload, observed_at, received_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(record.id)
            .bind(&record.reading_id)
            .bind(&record.device_id)
            .bind(record.patient_id)
            .bind(&record.metric_type)
            .bind(Json(&record.raw_payload))
            .bind(record.observed_at)
            .bind(record.received_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::AuditWrite(e.to_string()))?;
            counts.audit += result.rows_affected();
        }

        for vital in vitals {
            let result = sqlx::query(
                r#"
                INSERT INTO patient_vitals (
                    id, audit_id, reading_id, device_id, patient_id,
                    vital_type, value, unit, observed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (device_id, reading_id) DO NOTHING
                "#,
            )
            .bind(vital.id)
            .bind(vital.audit_id)
            .bind(&vital.reading_id)
            .bind(&vital.device_id)
            .bind(vital.patient_id)
            .bind(vital.vital_type.as_str())
            .bind(vital.value)
            .bind(&vital.unit)
            .bind(vital.observed_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::StructuredWrite(e.to_string()))?;
            counts.structured += result.rows_affected();
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit().await?;
        Ok(counts)
    }
}
