use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Custody of a physical device by a patient.
///
/// Several rows can exist per device; only the one with the latest
/// `assigned_at` is consulted, and it authorizes only while unrevoked.
#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct DeviceAssignment {
    pub id: Uuid,
    pub device_id: String,
    pub patient_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl DeviceAssignment {
    pub fn new(device_id: impl Into<String>, patient_id: Uuid, assigned_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            patient_id,
            assigned_at,
            revoked_at: None,
        }
    }

    pub fn revoked(mut self, revoked_at: DateTime<Utc>) -> Self {
        self.revoked_at = Some(revoked_at);
        self
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}
