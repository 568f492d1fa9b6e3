//! HMAC-SHA256 signing of upload batches.
//!
//! The signed message is `"<timestamp>.<body>"` where `body` is the exact JSON
//! string sent over the wire. Devices sign, the ingestion endpoint verifies
//! against the raw request bytes, so both ends agree byte-for-byte without
//! re-serializing.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-veri-timestamp";
pub const SIGNATURE_HEADER: &str = "x-veri-signature";

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Failed to create HMAC: {0}")]
    Key(String),
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Missing header {0}")]
    MissingHeader(&'static str),
    #[error("Invalid signature timestamp")]
    InvalidTimestamp,
    #[error("Signature timestamp outside the accepted window")]
    StaleTimestamp,
    #[error("Invalid signature")]
    Mismatch,
}

/// A body ready to send, with the headers that authenticate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBody {
    pub timestamp: String,
    pub body: String,
    pub signature: String,
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `serde_json` output is stable for a given value: struct fields keep
/// declaration order and `serde_json::Map` keeps keys sorted.
pub fn canonical_json<T: Serialize>(payload: &T) -> Result<String, SignatureError> {
    Ok(serde_json::to_string(payload)?)
}

fn mac_for(secret: &SecretString, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| SignatureError::Key(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

pub fn compute_signature(secret: &SecretString, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mac = mac_for(secret, timestamp, body)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Serialize `payload` and sign it. `timestamp` defaults to now.
pub fn sign<T: Serialize>(
    secret: &SecretString,
    payload: &T,
    timestamp: Option<DateTime<Utc>>,
) -> Result<SignedBody, SignatureError> {
    let timestamp = format_timestamp(timestamp.unwrap_or_else(Utc::now));
    let body = canonical_json(payload)?;
    let signature = compute_signature(secret, &timestamp, body.as_bytes())?;
    Ok(SignedBody { timestamp, body, signature })
}

/// Constant-time check of a hex signature over `"<timestamp>.<body>"`.
pub fn verify_signature(
    secret: &SecretString,
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), SignatureError> {
    let provided = hex::decode(signature.trim()).map_err(|_| SignatureError::Mismatch)?;
    mac_for(secret, timestamp, body)?
        .verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

/// Parse a signature timestamp and reject it if it drifts more than `max_skew` from `now`.
pub fn check_freshness(
    timestamp: &str,
    now: DateTime<Utc>,
    max_skew: Duration,
) -> Result<DateTime<Utc>, SignatureError> {
    let signed_at = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|_| SignatureError::InvalidTimestamp)?
        .with_timezone(&Utc);
    if (now - signed_at).abs() > max_skew {
        return Err(SignatureError::StaleTimestamp);
    }
    Ok(signed_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn secret(value: &str) -> SecretString {
        SecretString::new(value.to_string().into_boxed_str())
    }

    fn at(seconds: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, seconds).unwrap()
    }

    #[test]
    fn test_signing_is_deterministic() {
        let payload = json!({ "readings": [], "uploadedAt": "2025-03-01T08:00:00.000Z" });
        let first = sign(&secret("device-secret"), &payload, Some(at(0))).unwrap();
        let second = sign(&secret("device-secret"), &payload, Some(at(0))).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.timestamp, "2025-03-01T08:00:00.000Z");
        assert_eq!(first.signature.len(), 64);
    }

    #[test]
    fn test_signature_changes_with_any_input() {
        let payload = json!({ "readings": [1, 2, 3] });
        let base = sign(&secret("device-secret"), &payload, Some(at(0))).unwrap();

        let other_secret = sign(&secret("other-secret"), &payload, Some(at(0))).unwrap();
        let other_payload = sign(&secret("device-secret"), &json!({ "readings": [1, 2] }), Some(at(0))).unwrap();
        let other_time = sign(&secret("device-secret"), &payload, Some(at(1))).unwrap();

        assert_ne!(base.signature, other_secret.signature);
        assert_ne!(base.signature, other_payload.signature);
        assert_ne!(base.signature, other_time.signature);
    }

    #[test]
    fn test_verify_round_trip_and_tamper() {
        let key = secret("device-secret");
        let signed = sign(&key, &json!({ "a": 1 }), Some(at(0))).unwrap();

        assert!(verify_signature(&key, &signed.timestamp, signed.body.as_bytes(), &signed.signature).is_ok());
        assert!(matches!(
            verify_signature(&key, &signed.timestamp, br#"{"a":2}"#, &signed.signature),
            Err(SignatureError::Mismatch)
        ));
        assert!(matches!(
            verify_signature(&key, &signed.timestamp, signed.body.as_bytes(), "not-hex"),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_freshness_window() {
        let max_skew = Duration::seconds(300);
        assert!(check_freshness("2025-03-01T08:00:00.000Z", at(30), max_skew).is_ok());
        assert!(matches!(
            check_freshness("2025-03-01T07:50:00.000Z", at(0), max_skew),
            Err(SignatureError::StaleTimestamp)
        ));
        assert!(matches!(
            check_freshness("yesterday", at(0), max_skew),
            Err(SignatureError::InvalidTimestamp)
        ));
    }
}
