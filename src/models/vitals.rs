use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// Metric types that get a structured row next to their audit record.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VitalType {
    HeartRate,
    Spo2,
    Steps,
    Temperature,
    RespiratoryRate,
}

impl VitalType {
    pub fn from_metric(metric_type: &str) -> Option<Self> {
        match metric_type {
            "heart_rate" => Some(VitalType::HeartRate),
            "spo2" => Some(VitalType::Spo2),
            "steps" => Some(VitalType::Steps),
            "temperature" => Some(VitalType::Temperature),
            "respiratory_rate" => Some(VitalType::RespiratoryRate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VitalType::HeartRate => "heart_rate",
            VitalType::Spo2 => "spo2",
            VitalType::Steps => "steps",
            VitalType::Temperature => "temperature",
            VitalType::RespiratoryRate => "respiratory_rate",
        }
    }
}

impl Display for VitalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reduce a reading value to the number stored in a structured row.
///
/// Scalars always produce a number: strings and booleans go through numeric
/// parsing and fall back to `0.0`, as does anything non-finite ("NaN",
/// "inf"). Null, objects and arrays produce `None`.
pub fn coerce_vital_value(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Bool(b) => b.to_string().parse::<f64>().ok(),
        _ => return None,
    };
    Some(parsed.filter(|v| v.is_finite()).unwrap_or(0.0))
}

/// Write-once copy of an accepted reading.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditRecord {
    pub id: Uuid,
    pub reading_id: String,
    pub device_id: String,
    /// Resolved from the device assignment, never taken from the payload.
    pub patient_id: Uuid,
    pub metric_type: String,
    pub raw_payload: serde_json::Value,
    pub observed_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StructuredVital {
    pub id: Uuid,
    pub audit_id: Uuid,
    pub reading_id: String,
    pub device_id: String,
    pub patient_id: Uuid,
    pub vital_type: VitalType,
    pub value: f64,
    pub unit: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InsertedCounts {
    pub audit: u64,
    pub structured: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub inserted: InsertedCounts,
}
