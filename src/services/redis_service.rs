use std::sync::Arc;
use chrono::Utc;
use redis::{AsyncCommands, Client};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::redis::RedisSettings;
use crate::ingestion::IngestSummary;

#[derive(Clone, Debug)]
pub struct RedisService {
    pub client: Arc<Client>,
}

impl RedisService {
    pub fn new(settings: &RedisSettings) -> Result<Self, redis::RedisError> {
        let client = match Client::open(settings.get_redis_url().expose_secret()) {
                Ok(client) => {
                    tracing::info!("Redis client created successfully");
                    client
                },
                Err(e) => {
                    tracing::error!("Failed to create Redis client: {}", e);
                    return Err(e);
                }
            };
        Ok(Self { client: Arc::new(client) })
    }
}

pub fn patient_channel(patient_id: Uuid) -> String {
    format!("veri:events:patient:{}", patient_id)
}

/// Tell dashboard subscribers that new readings landed for each patient.
///
/// Best-effort: a missing client or a publish failure never fails ingestion.
pub async fn publish_ingestion_events(
    redis: Option<Arc<Client>>,
    summary: &IngestSummary,
) {
    let redis_client = match redis {
        Some(client) => client,
        None => {
            tracing::debug!("Redis not available - skipping ingestion events");
            return;
        }
    };

    let mut conn = match redis_client.get_async_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Redis connection failed during ingestion event publishing: {}", e);
            return;
        }
    };

    for (patient_id, readings) in &summary.readings_per_patient {
        let event = serde_json::json!({
            "event_type": "wearable_readings_ingested",
            "patient_id": patient_id.to_string(),
            "readings": readings,
            "timestamp": Utc::now().to_rfc3339()
        });

        let result: Result<i64, redis::RedisError> = conn
            .publish(patient_channel(*patient_id), event.to_string())
            .await;
        match result {
            Ok(receivers) => {
                tracing::debug!("Published ingestion event for patient {} to {} subscribers", patient_id, receivers);
            }
            Err(e) => {
                tracing::error!("Failed to publish ingestion event for patient {}: {}", patient_id, e);
            }
        }
    }
}
