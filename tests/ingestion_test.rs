use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

mod common;
use common::utils::{signing_secret, spawn_app, spawn_signed_app};

use veri_backend::models::device_assignment::DeviceAssignment;
use veri_backend::utils::signature::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};

fn reading(id: &str, device_id: &str, metric_type: &str, value: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "deviceId": device_id,
        "type": metric_type,
        "value": value,
        "unit": "bpm",
        "timestamp": "2025-03-01T08:00:00.000Z"
    })
}

fn batch(readings: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "readings": readings, "uploadedAt": Utc::now().to_rfc3339() })
}

#[tokio::test]
async fn ingest_writes_audit_and_structured_rows() {
    let test_app = spawn_app().await;
    let client = Client::new();
    let patient_id = test_app.assign_device("band-1").await;

    let response = client
        .post(&test_app.ingest_url())
        .json(&batch(vec![
            reading("r-1", "band-1", "heart_rate", json!(72)),
            reading("r-2", "band-1", "spo2", json!("97.5")),
            reading("r-3", "band-1", "device_discovered", json!({ "rssi": -60 })),
        ]))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Cannot turn into a json.");
    assert_eq!(body, json!({ "success": true, "inserted": { "audit": 3, "structured": 2 } }));

    let audit = test_app.store.audit_records().await;
    assert_eq!(audit.len(), 3);
    assert!(audit.iter().all(|record| record.patient_id == patient_id));
    let vitals = test_app.store.structured_vitals().await;
    assert_eq!(vitals.iter().map(|v| v.value).collect::<Vec<_>>(), vec![72.0, 97.5]);
}

#[tokio::test]
async fn ingest_ignores_client_supplied_patient_id() {
    let test_app = spawn_app().await;
    let client = Client::new();
    let patient_id = test_app.assign_device("band-1").await;

    let mut spoofed = reading("r-1", "band-1", "heart_rate", json!(80));
    spoofed["patientId"] = json!(Uuid::new_v4().to_string());

    let response = client
        .post(&test_app.ingest_url())
        .json(&batch(vec![spoofed]))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(test_app.store.audit_records().await[0].patient_id, patient_id);
    assert_eq!(test_app.store.structured_vitals().await[0].patient_id, patient_id);
}

#[tokio::test]
async fn ingest_rejects_wrong_content_type() {
    let test_app = spawn_app().await;
    let client = Client::new();
    test_app.assign_device("band-1").await;

    let response = client
        .post(&test_app.ingest_url())
        .header("Content-Type", "text/plain")
        .body(batch(vec![reading("r-1", "band-1", "heart_rate", json!(72))]).to_string())
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 400);
    assert!(test_app.store.audit_records().await.is_empty());
}

#[tokio::test]
async fn ingest_accepts_content_type_in_any_case() {
    let test_app = spawn_app().await;
    let client = Client::new();
    test_app.assign_device("band-1").await;

    let response = client
        .post(&test_app.ingest_url())
        .header("Content-Type", "Application/JSON; charset=utf-8")
        .body(batch(vec![reading("r-1", "band-1", "heart_rate", json!(72))]).to_string())
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(test_app.store.audit_records().await.len(), 1);
}

#[tokio::test]
async fn ingest_rejects_malformed_batches_atomically() {
    let test_app = spawn_app().await;
    let client = Client::new();
    test_app.assign_device("band-1").await;

    let mut missing_timestamp = reading("r-2", "band-1", "heart_rate", json!(70));
    missing_timestamp.as_object_mut().unwrap().remove("timestamp");
    let mut bad_timestamp = reading("r-2", "band-1", "heart_rate", json!(70));
    bad_timestamp["timestamp"] = json!("last tuesday");

    let test_cases = vec![
        (reading("r-2", "", "heart_rate", json!(70)), "missing deviceId"),
        (reading("r-2", "band-1", "", json!(70)), "missing type"),
        (missing_timestamp, "missing timestamp"),
        (bad_timestamp, "unparseable timestamp"),
    ];

    for (invalid, description) in test_cases {
        let response = client
            .post(&test_app.ingest_url())
            .json(&batch(vec![reading("r-1", "band-1", "heart_rate", json!(72)), invalid]))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(response.status().as_u16(), 400, "Expected 400 for {}", description);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
    }

    let response = client
        .post(&test_app.ingest_url())
        .header("Content-Type", "application/json")
        .body("{ not json")
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 400);

    assert!(test_app.store.audit_records().await.is_empty());
}

#[tokio::test]
async fn ingest_rejects_unassigned_and_revoked_devices() {
    let test_app = spawn_app().await;
    let client = Client::new();
    test_app.assign_device("band-1").await;
    test_app
        .store
        .add_assignment(
            DeviceAssignment::new("band-2", Uuid::new_v4(), Utc::now() - Duration::days(2))
                .revoked(Utc::now() - Duration::days(1)),
        )
        .await;

    for device_id in ["band-9", "band-2"] {
        let response = client
            .post(&test_app.ingest_url())
            .json(&batch(vec![
                reading("r-1", "band-1", "heart_rate", json!(72)),
                reading("r-2", device_id, "heart_rate", json!(72)),
            ]))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(response.status().as_u16(), 403);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains(device_id));
    }

    assert!(test_app.store.audit_records().await.is_empty());
    assert!(test_app.store.structured_vitals().await.is_empty());
}

#[tokio::test]
async fn ingest_storage_failure_returns_generic_500() {
    let test_app = spawn_app().await;
    let client = Client::new();
    test_app.assign_device("band-1").await;
    test_app.store.set_fail_audit(true);

    let response = client
        .post(&test_app.ingest_url())
        .json(&batch(vec![reading("r-1", "band-1", "heart_rate", json!(72))]))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "storage_failure" }));
    assert!(test_app.store.structured_vitals().await.is_empty());
}

#[tokio::test]
async fn ingest_verifies_signatures_when_configured() {
    let test_app = spawn_signed_app().await;
    let client = Client::new();
    test_app.assign_device("band-1").await;

    let payload = batch(vec![reading("r-1", "band-1", "heart_rate", json!(72))]);
    let signed = sign(&signing_secret(), &payload, None).unwrap();

    // Unsigned
    let response = client
        .post(&test_app.ingest_url())
        .json(&payload)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 401);

    // Body altered after signing
    let tampered = signed.body.replace("72", "180");
    let response = client
        .post(&test_app.ingest_url())
        .header("Content-Type", "application/json")
        .header(TIMESTAMP_HEADER, &signed.timestamp)
        .header(SIGNATURE_HEADER, &signed.signature)
        .body(tampered)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 401);

    // Stale timestamp
    let stale = sign(&signing_secret(), &payload, Some(Utc::now() - Duration::hours(1))).unwrap();
    let response = client
        .post(&test_app.ingest_url())
        .header("Content-Type", "application/json")
        .header(TIMESTAMP_HEADER, &stale.timestamp)
        .header(SIGNATURE_HEADER, &stale.signature)
        .body(stale.body.clone())
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 401);
    assert!(test_app.store.audit_records().await.is_empty());

    let response = client
        .post(&test_app.ingest_url())
        .header("Content-Type", "application/json")
        .header(TIMESTAMP_HEADER, &signed.timestamp)
        .header(SIGNATURE_HEADER, &signed.signature)
        .body(signed.body.clone())
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(test_app.store.audit_records().await.len(), 1);
}

#[tokio::test]
async fn ingest_empty_batch_reports_zero_counts() {
    let test_app = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(&test_app.ingest_url())
        .json(&batch(vec![]))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["inserted"], json!({ "audit": 0, "structured": 0 }));
}
