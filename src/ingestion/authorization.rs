use std::collections::HashMap;
use uuid::Uuid;

use crate::db::store::IngestionStore;
use crate::ingestion::error::IngestError;
use crate::ingestion::validation::ValidatedReading;

/// Distinct device ids in order of first appearance.
pub fn distinct_devices(readings: &[ValidatedReading]) -> Vec<String> {
    let mut devices: Vec<String> = Vec::new();
    for reading in readings {
        if !devices.contains(&reading.device_id) {
            devices.push(reading.device_id.clone());
        }
    }
    devices
}

/// Resolve the patient behind every device in the batch.
///
/// One lookup covers the whole batch. The first device without an active
/// assignment rejects everything.
#[tracing::instrument(name = "Authorize devices", skip(store, readings), fields(readings = readings.len()))]
pub async fn authorize_devices(
    store: &dyn IngestionStore,
    readings: &[ValidatedReading],
) -> Result<HashMap<String, Uuid>, IngestError> {
    let devices = distinct_devices(readings);
    if devices.is_empty() {
        return Ok(HashMap::new());
    }

    let assignments = store.latest_assignments(&devices).await?;

    let mut patients = HashMap::with_capacity(devices.len());
    for device_id in devices {
        match assignments.get(&device_id) {
            Some(assignment) if assignment.is_active() => {
                patients.insert(device_id, assignment.patient_id);
            }
            Some(_) => {
                tracing::warn!("Rejecting batch: assignment for device {} is revoked", device_id);
                return Err(IngestError::DeviceNotAuthorized { device_id });
            }
            None => {
                tracing::warn!("Rejecting batch: device {} has no assignment", device_id);
                return Err(IngestError::DeviceNotAuthorized { device_id });
            }
        }
    }

    Ok(patients)
}
