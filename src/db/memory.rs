use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::store::{IngestionStore, StoreError};
use crate::models::device_assignment::DeviceAssignment;
use crate::models::vitals::{AuditRecord, InsertedCounts, StructuredVital};

#[derive(Default)]
struct MemoryState {
    assignments: Vec<DeviceAssignment>,
    audit: Vec<AuditRecord>,
    vitals: Vec<StructuredVital>,
}

/// In-process ingestion store for local development and tests.
///
/// Writes are all-or-nothing per batch, matching the Postgres transaction.
#[derive(Clone, Default)]
pub struct InMemoryIngestionStore {
    state: Arc<RwLock<MemoryState>>,
    fail_audit: Arc<AtomicBool>,
    fail_structured: Arc<AtomicBool>,
}

impl InMemoryIngestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_assignment(&self, assignment: DeviceAssignment) {
        self.state.write().await.assignments.push(assignment);
    }

    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.state.read().await.audit.clone()
    }

    pub async fn structured_vitals(&self) -> Vec<StructuredVital> {
        self.state.read().await.vitals.clone()
    }

    /// Make the next writes fail at the audit step.
    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Make the next writes fail at the structured step.
    pub fn set_fail_structured(&self, fail: bool) {
        self.fail_structured.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl IngestionStore for InMemoryIngestionStore {
    async fn latest_assignments(
        &self,
        device_ids: &[String],
    ) -> Result<HashMap<String, DeviceAssignment>, StoreError> {
        let state = self.state.read().await;
        let mut latest: HashMap<String, DeviceAssignment> = HashMap::new();

        for assignment in state
            .assignments
            .iter()
            .filter(|a| device_ids.contains(&a.device_id))
        {
            let newer = latest
                .get(&assignment.device_id)
                .map_or(true, |current| assignment.assigned_at > current.assigned_at);
            if newer {
                latest.insert(assignment.device_id.clone(), assignment.clone());
            }
        }

        Ok(latest)
    }

    async fn persist_batch(
        &self,
        audit: &[AuditRecord],
        vitals: &[StructuredVital],
    ) -> Result<InsertedCounts, StoreError> {
        let mut state = self.state.write().await;

        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(StoreError::AuditWrite("audit log unavailable".to_string()));
        }
        if self.fail_structured.load(Ordering::SeqCst) {
            return Err(StoreError::StructuredWrite("vitals table unavailable".to_string()));
        }

        let mut seen: HashSet<(String, String)> = state
            .vitals
            .iter()
            .map(|v| (v.device_id.clone(), v.reading_id.clone()))
            .collect();
        let fresh: Vec<StructuredVital> = vitals
            .iter()
            .filter(|v| seen.insert((v.device_id.clone(), v.reading_id.clone())))
            .cloned()
            .collect();

        let counts = InsertedCounts {
            audit: audit.len() as u64,
            structured: fresh.len() as u64,
        };
        state.audit.extend_from_slice(audit);
        state.vitals.extend(fresh);

        Ok(counts)
    }
}
