use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use std::sync::Arc;

use crate::config::ingestion::IngestionSettings;
use crate::db::store::IngestionStore;
use crate::ingestion::{ingest_batch, parse_batch, validate_batch, IngestError};
use crate::models::vitals::IngestResponse;
use crate::services::redis_service::publish_ingestion_events;
use crate::utils::signature::{
    check_freshness, verify_signature, SignatureError, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

fn header<'a>(req: &'a HttpRequest, name: &'static str) -> Result<&'a str, SignatureError> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

fn verify_request_signature(
    req: &HttpRequest,
    body: &[u8],
    secret: &SecretString,
    max_clock_skew_seconds: i64,
) -> Result<(), SignatureError> {
    let timestamp = header(req, TIMESTAMP_HEADER)?;
    let signature = header(req, SIGNATURE_HEADER)?;
    check_freshness(timestamp, Utc::now(), Duration::seconds(max_clock_skew_seconds))?;
    verify_signature(secret, timestamp, body, signature)
}

#[tracing::instrument(
    name = "Ingest wearable readings",
    skip(req, body, store, settings, redis),
    fields(body_bytes = body.len())
)]
pub async fn ingest_readings(
    req: HttpRequest,
    body: web::Bytes,
    store: web::Data<dyn IngestionStore>,
    settings: web::Data<IngestionSettings>,
    redis: Option<web::Data<Arc<redis::Client>>>,
) -> Result<HttpResponse, IngestError> {
    // MIME types compare case-insensitively; parameters such as charset are already stripped
    if !req.content_type().eq_ignore_ascii_case("application/json") {
        tracing::warn!("Rejecting batch with content type '{}'", req.content_type());
        return Err(IngestError::UnsupportedContentType);
    }

    if let Some(secret) = &settings.signing_secret {
        verify_request_signature(&req, &body, secret, settings.max_clock_skew_seconds).map_err(|e| {
            tracing::warn!("Rejecting batch with bad signature: {}", e);
            IngestError::Signature(e)
        })?;
    }

    let batch = parse_batch(&body)?;
    if let Some(uploaded_at) = &batch.uploaded_at {
        tracing::debug!("Batch of {} readings sent at {}", batch.readings.len(), uploaded_at);
    }
    let readings = validate_batch(batch, settings.max_batch_size)?;

    let summary = ingest_batch(store.get_ref(), &readings).await?;

    let redis_client = redis.map(|client| client.get_ref().clone());
    let event_summary = summary.clone();
    tokio::spawn(async move {
        publish_ingestion_events(redis_client, &event_summary).await;
    });

    Ok(HttpResponse::Ok().json(IngestResponse {
        success: true,
        inserted: summary.inserted,
    }))
}
