use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::store::IngestionStore;
use crate::ingestion::authorization::authorize_devices;
use crate::ingestion::error::IngestError;
use crate::ingestion::validation::ValidatedReading;
use crate::models::vitals::{coerce_vital_value, AuditRecord, InsertedCounts, StructuredVital, VitalType};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub inserted: InsertedCounts,
    /// Audit rows written per patient, for downstream notification.
    pub readings_per_patient: HashMap<Uuid, u64>,
}

/// Split validated readings into audit rows and structured vitals.
///
/// `patients` must hold an entry for every device in `readings`.
pub fn build_records(
    readings: &[ValidatedReading],
    patients: &HashMap<String, Uuid>,
    received_at: DateTime<Utc>,
) -> (Vec<AuditRecord>, Vec<StructuredVital>) {
    let mut audit = Vec::with_capacity(readings.len());
    let mut vitals = Vec::new();

    for reading in readings {
        let Some(&patient_id) = patients.get(&reading.device_id) else {
            continue;
        };

        let record = AuditRecord {
            id: Uuid::new_v4(),
            reading_id: reading.reading_id.clone(),
            device_id: reading.device_id.clone(),
            patient_id,
            metric_type: reading.metric_type.clone(),
            raw_payload: reading.raw.clone(),
            observed_at: reading.observed_at,
            received_at,
        };

        let structured = VitalType::from_metric(&reading.metric_type)
            .zip(coerce_vital_value(&reading.value));
        if let Some((vital_type, value)) = structured {
            vitals.push(StructuredVital {
                id: Uuid::new_v4(),
                audit_id: record.id,
                reading_id: reading.reading_id.clone(),
                device_id: reading.device_id.clone(),
                patient_id,
                vital_type,
                value,
                unit: reading.unit.clone(),
                observed_at: reading.observed_at,
            });
        }

        audit.push(record);
    }

    (audit, vitals)
}

/// Authorize a validated batch and write it to the audit log and vitals table.
#[tracing::instrument(name = "Ingest wearable batch", skip(store, readings), fields(readings = readings.len()))]
pub async fn ingest_batch(
    store: &dyn IngestionStore,
    readings: &[ValidatedReading],
) -> Result<IngestSummary, IngestError> {
    if readings.is_empty() {
        return Ok(IngestSummary::default());
    }

    let patients = authorize_devices(store, readings).await?;
    let (audit, vitals) = build_records(readings, &patients, Utc::now());

    let inserted = store.persist_batch(&audit, &vitals).await.map_err(|e| {
        tracing::error!("Failed to persist wearable batch: {}", e);
        IngestError::Storage(e)
    })?;

    let mut readings_per_patient: HashMap<Uuid, u64> = HashMap::new();
    for record in &audit {
        *readings_per_patient.entry(record.patient_id).or_default() += 1;
    }

    tracing::info!(
        "Ingested {} audit rows and {} structured vitals for {} patients",
        inserted.audit,
        inserted.structured,
        readings_per_patient.len()
    );

    Ok(IngestSummary { inserted, readings_per_patient })
}
