use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::device::queue::backend::QueueBackend;
use crate::device::queue::error::QueueError;
use crate::device::queue::sqlite::SqliteQueueBackend;
use crate::models::reading::WearableReading;

pub const LAST_SYNC_KEY: &str = "last_successful_sync";

/// Durable queue of readings waiting for upload.
///
/// The backend is optional: without one (no native storage, e.g. a web
/// build) writes are dropped and reads come back empty instead of failing.
/// The queue never retries; that is the orchestrator's call.
#[derive(Clone)]
pub struct LocalQueue {
    backend: Option<Arc<dyn QueueBackend>>,
}

impl LocalQueue {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend: Some(backend) }
    }

    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Open the SQLite queue at `url`, falling back to a backend-less queue.
    pub async fn open(url: &str) -> Self {
        match SqliteQueueBackend::connect(url).await {
            Ok(backend) => Self::new(Arc::new(backend)),
            Err(e) => {
                warn!("Local queue storage unavailable, readings will not be persisted: {}", e);
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn initialize(&self) -> Result<(), QueueError> {
        match &self.backend {
            Some(backend) => backend.initialize().await,
            None => Ok(()),
        }
    }

    /// Upsert by id; a second enqueue of the same id replaces the first.
    pub async fn enqueue(&self, reading: &WearableReading) -> Result<(), QueueError> {
        match &self.backend {
            Some(backend) => backend.upsert(reading).await,
            None => {
                debug!("No queue storage, dropping reading {}", reading.id);
                Ok(())
            }
        }
    }

    /// Up to `limit` unuploaded readings, oldest first.
    pub async fn dequeue_batch(&self, limit: usize) -> Result<Vec<WearableReading>, QueueError> {
        match &self.backend {
            Some(_) if limit == 0 => Ok(Vec::new()),
            Some(backend) => backend.pending(limit).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn mark_uploaded(&self, ids: &[String]) -> Result<(), QueueError> {
        match &self.backend {
            Some(_) if ids.is_empty() => Ok(()),
            Some(backend) => {
                let updated = backend.mark_uploaded(ids).await?;
                debug!("Marked {} of {} readings uploaded", updated, ids.len());
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Flag an uploaded batch, skipping readings re-enqueued since it was selected.
    pub async fn mark_batch_uploaded(&self, batch: &[WearableReading]) -> Result<(), QueueError> {
        match &self.backend {
            Some(_) if batch.is_empty() => Ok(()),
            Some(backend) => {
                let updated = backend.mark_selected_uploaded(batch).await?;
                if updated < batch.len() as u64 {
                    debug!("{} readings changed during upload and stay queued", batch.len() as u64 - updated);
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub async fn pending_count(&self) -> Result<u64, QueueError> {
        match &self.backend {
            Some(backend) => backend.pending_count().await,
            None => Ok(0),
        }
    }

    pub async fn record_last_sync(&self, at: DateTime<Utc>) -> Result<(), QueueError> {
        match &self.backend {
            Some(backend) => {
                backend
                    .set_state(LAST_SYNC_KEY, &at.to_rfc3339_opts(SecondsFormat::Millis, true))
                    .await
            }
            None => Ok(()),
        }
    }

    /// Last successful sync, for display. Unparseable values read as `None`.
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>, QueueError> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        let value = backend.get_state(LAST_SYNC_KEY).await?;
        Ok(value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }
}
