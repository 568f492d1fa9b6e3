use actix_web::{post, web, HttpRequest, HttpResponse};
use std::sync::Arc;

use crate::config::ingestion::IngestionSettings;
use crate::db::store::IngestionStore;
use crate::handlers::wearables::ingest_readings::ingest_readings;
use crate::ingestion::IngestError;

#[post("/ingest")]
async fn ingest(
    req: HttpRequest,
    body: web::Bytes,
    store: web::Data<dyn IngestionStore>,
    settings: web::Data<IngestionSettings>,
    redis: Option<web::Data<Arc<redis::Client>>>,
) -> Result<HttpResponse, IngestError> {
    ingest_readings(req, body, store, settings, redis).await
}
