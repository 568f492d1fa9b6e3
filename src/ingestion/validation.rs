use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::ingestion::error::IngestError;

/// Batch as received. Readings stay raw so the audit log keeps them verbatim.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingBatch {
    pub readings: Vec<Value>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

/// A reading that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReading {
    pub reading_id: String,
    pub device_id: String,
    pub metric_type: String,
    pub value: Value,
    pub unit: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub raw: Value,
}

pub fn parse_batch(body: &[u8]) -> Result<IncomingBatch, IngestError> {
    serde_json::from_slice(body).map_err(|e| IngestError::MalformedJson(e.to_string()))
}

/// Validate every reading; the first violation rejects the whole batch.
pub fn validate_batch(batch: IncomingBatch, max_batch_size: usize) -> Result<Vec<ValidatedReading>, IngestError> {
    if batch.readings.len() > max_batch_size {
        return Err(IngestError::BatchTooLarge {
            size: batch.readings.len(),
            max: max_batch_size,
        });
    }

    batch
        .readings
        .into_iter()
        .enumerate()
        .map(|(index, raw)| validate_reading(index, raw))
        .collect()
}

fn non_empty_str<'a>(object: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn validate_reading(index: usize, raw: Value) -> Result<ValidatedReading, IngestError> {
    let invalid = |reason: &'static str| IngestError::InvalidReading { index, reason };

    let object = raw.as_object().ok_or_else(|| invalid("reading_not_object"))?;

    let device_id = non_empty_str(object, "deviceId").ok_or_else(|| invalid("missing_device_id"))?;
    let metric_type = non_empty_str(object, "type").ok_or_else(|| invalid("missing_type"))?;
    let timestamp = non_empty_str(object, "timestamp").ok_or_else(|| invalid("missing_timestamp"))?;
    let observed_at = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|_| invalid("invalid_timestamp"))?
        .with_timezone(&Utc);

    let reading_id = match object.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    let unit = non_empty_str(object, "unit").map(str::to_string);
    let value = object.get("value").cloned().unwrap_or(Value::Null);

    Ok(ValidatedReading {
        reading_id,
        device_id: device_id.to_string(),
        metric_type: metric_type.to_string(),
        value,
        unit,
        observed_at,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(readings: Vec<Value>) -> IncomingBatch {
        IncomingBatch { readings, uploaded_at: None }
    }

    fn reading(device_id: &str, metric_type: &str, timestamp: &str) -> Value {
        json!({
            "id": "r-1",
            "deviceId": device_id,
            "type": metric_type,
            "value": 72,
            "unit": "bpm",
            "timestamp": timestamp
        })
    }

    #[test]
    fn test_valid_batch() {
        let readings = validate_batch(
            batch(vec![reading("band-1", "heart_rate", "2025-03-01T08:00:00Z")]),
            10,
        )
        .unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].device_id, "band-1");
        assert_eq!(readings[0].reading_id, "r-1");
        assert_eq!(readings[0].unit.as_deref(), Some("bpm"));
        assert_eq!(readings[0].raw["value"], 72);
    }

    #[test]
    fn test_one_bad_reading_rejects_batch() {
        let result = validate_batch(
            batch(vec![
                reading("band-1", "heart_rate", "2025-03-01T08:00:00Z"),
                reading("", "heart_rate", "2025-03-01T08:00:01Z"),
            ]),
            10,
        );
        assert!(matches!(
            result,
            Err(IngestError::InvalidReading { index: 1, reason: "missing_device_id" })
        ));
    }

    #[test]
    fn test_missing_type_and_bad_timestamp() {
        assert!(matches!(
            validate_batch(batch(vec![reading("band-1", " ", "2025-03-01T08:00:00Z")]), 10),
            Err(IngestError::InvalidReading { reason: "missing_type", .. })
        ));
        assert!(matches!(
            validate_batch(batch(vec![reading("band-1", "spo2", "last tuesday")]), 10),
            Err(IngestError::InvalidReading { reason: "invalid_timestamp", .. })
        ));
        assert!(matches!(
            validate_batch(batch(vec![json!("heart_rate=72")]), 10),
            Err(IngestError::InvalidReading { reason: "reading_not_object", .. })
        ));
    }

    #[test]
    fn test_missing_id_is_generated() {
        let mut raw = reading("band-1", "steps", "2025-03-01T08:00:00+02:00");
        raw.as_object_mut().unwrap().remove("id");

        let readings = validate_batch(batch(vec![raw]), 10).unwrap();
        assert!(Uuid::parse_str(&readings[0].reading_id).is_ok());
        assert_eq!(readings[0].observed_at.to_rfc3339(), "2025-03-01T06:00:00+00:00");
    }

    #[test]
    fn test_batch_size_limit() {
        let readings = (0..3)
            .map(|_| reading("band-1", "steps", "2025-03-01T08:00:00Z"))
            .collect();
        assert!(matches!(
            validate_batch(batch(readings), 2),
            Err(IngestError::BatchTooLarge { size: 3, max: 2 })
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(matches!(parse_batch(b"{\"readings\": ["), Err(IngestError::MalformedJson(_))));
        assert!(matches!(parse_batch(b"{\"uploadedAt\": \"x\"}"), Err(IngestError::MalformedJson(_))));
        assert!(parse_batch(br#"{"readings": [], "uploadedAt": "2025-03-01T08:00:00Z"}"#).is_ok());
    }
}
