use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::device_assignment::DeviceAssignment;
use crate::models::vitals::{AuditRecord, InsertedCounts, StructuredVital};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Assignment lookup failed: {0}")]
    Lookup(String),

    #[error("Audit insert failed: {0}")]
    AuditWrite(String),

    #[error("Structured insert failed: {0}")]
    StructuredWrite(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence used by the ingestion endpoint.
#[async_trait]
pub trait IngestionStore: Send + Sync + 'static {
    /// Most recent assignment row for each requested device, revoked or not.
    /// Devices that were never assigned are absent from the map.
    async fn latest_assignments(
        &self,
        device_ids: &[String],
    ) -> Result<HashMap<String, DeviceAssignment>, StoreError>;

    /// Write audit rows, then structured rows, as a single unit.
    ///
    /// Nothing is kept if either step fails. A structured row whose
    /// `(device_id, reading_id)` already exists is skipped and not counted.
    async fn persist_batch(
        &self,
        audit: &[AuditRecord],
        vitals: &[StructuredVital],
    ) -> Result<InsertedCounts, StoreError>;
}
