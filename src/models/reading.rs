use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metric name emitted when the provisioned wearable is seen during a scan.
pub const DEVICE_DISCOVERED: &str = "device_discovered";

/// A single timestamped observation produced by a wearable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WearableReading {
    pub id: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub value: ReadingValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// When the reading was observed, not when it was uploaded.
    pub timestamp: DateTime<Utc>,
    /// Local queue state. Never sent over the wire.
    #[serde(default, skip_serializing)]
    pub uploaded: bool,
    /// Local queue version, bumped every time the same id is enqueued again.
    #[serde(skip)]
    pub revision: u64,
}

impl WearableReading {
    pub fn new(
        device_id: impl Into<String>,
        metric_type: impl Into<String>,
        value: ReadingValue,
        unit: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            metric_type: metric_type.into(),
            value,
            unit,
            timestamp,
            uploaded: false,
            revision: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Either a plain number or an opaque structured payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(f64),
    Structured(serde_json::Value),
}

impl ReadingValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ReadingValue::Number(n) => Some(*n),
            ReadingValue::Structured(_) => None,
        }
    }
}

impl From<f64> for ReadingValue {
    fn from(value: f64) -> Self {
        ReadingValue::Number(value)
    }
}

impl From<serde_json::Value> for ReadingValue {
    fn from(value: serde_json::Value) -> Self {
        match value.as_f64() {
            Some(n) => ReadingValue::Number(n),
            None => ReadingValue::Structured(value),
        }
    }
}

/// Transport envelope for one upload attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WearableSyncPayload {
    pub readings: Vec<WearableReading>,
    /// Send time on the device.
    pub uploaded_at: DateTime<Utc>,
}

impl WearableSyncPayload {
    pub fn new(readings: Vec<WearableReading>, uploaded_at: DateTime<Utc>) -> Self {
        Self { readings, uploaded_at }
    }
}
