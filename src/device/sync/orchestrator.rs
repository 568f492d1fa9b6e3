use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::device::credentials::CredentialStore;
use crate::device::queue::LocalQueue;
use crate::device::sync::report::{SyncError, SyncPhase, SyncReport};
use crate::device::transport::UploadTransport;
use crate::models::reading::WearableSyncPayload;
use crate::utils::signature::{sign, SignedBody};

pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const BASE_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub batch_size: usize,
    /// Upload attempts per run for background syncs.
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: BASE_BACKOFF,
        }
    }
}

/// `2^attempt * base`, with `attempt` counted from zero.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt.min(16)))
        .unwrap_or(Duration::MAX)
}

/// Statuses worth another attempt. Other 4xx mean the server rejected the
/// batch itself, which the same signed request cannot change.
fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Resets the single-flight latch when a run ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Moves queued readings to the ingestion endpoint.
///
/// Foreground and background runs share one latch, so a batch is never
/// selected twice while an upload is in flight.
pub struct SyncOrchestrator {
    queue: LocalQueue,
    credentials: Arc<dyn CredentialStore>,
    transport: Arc<dyn UploadTransport>,
    options: SyncOptions,
    in_flight: AtomicBool,
    phase: watch::Sender<SyncPhase>,
}

impl SyncOrchestrator {
    pub fn new(
        queue: LocalQueue,
        credentials: Arc<dyn CredentialStore>,
        transport: Arc<dyn UploadTransport>,
        options: SyncOptions,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            queue,
            credentials,
            transport,
            options,
            in_flight: AtomicBool::new(false),
            phase,
        }
    }

    pub fn queue(&self) -> &LocalQueue {
        &self.queue
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// User-triggered sync with an explicit retry ceiling.
    pub async fn run_foreground_sync(&self, max_retries: u32) -> SyncReport {
        self.run("foreground", self.options.batch_size, max_retries).await
    }

    pub async fn run_background_sync(&self) -> SyncReport {
        self.run("background", self.options.batch_size, self.options.max_retries).await
    }

    async fn run(&self, trigger: &'static str, batch_size: usize, max_retries: u32) -> SyncReport {
        match self.sync_once(batch_size, max_retries).await {
            Ok(processed) => {
                info!("{} sync uploaded {} readings", trigger, processed);
                SyncReport::succeeded(processed)
            }
            Err(SyncError::InProgress) => {
                debug!("{} sync skipped, another sync is running", trigger);
                SyncReport::failed(&SyncError::InProgress)
            }
            Err(e) => {
                warn!("{} sync failed: {}", trigger, e);
                SyncReport::failed(&e)
            }
        }
    }

    fn try_acquire(&self) -> Result<InFlightGuard<'_>, SyncError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlightGuard(&self.in_flight))
            .map_err(|_| SyncError::InProgress)
    }

    /// One attempt: select, sign, upload with retry, mark uploaded.
    /// Returns the number of readings the server accepted.
    #[tracing::instrument(name = "Sync wearable batch", skip(self))]
    pub async fn sync_once(&self, batch_size: usize, max_retries: u32) -> Result<usize, SyncError> {
        let _guard = self.try_acquire()?;
        let result = self.sync_batch(batch_size, max_retries).await;
        // Published while the latch is still held so a later run cannot be overwritten
        if result.is_err() {
            self.phase.send_replace(SyncPhase::Failed);
        }
        result
    }

    async fn sync_batch(&self, batch_size: usize, max_retries: u32) -> Result<usize, SyncError> {
        self.phase.send_replace(SyncPhase::Idle);

        let batch = self.queue.dequeue_batch(batch_size).await?;
        if batch.is_empty() {
            debug!("Nothing queued for upload");
            self.phase.send_replace(SyncPhase::Success { processed: 0 });
            return Ok(0);
        }
        self.phase.send_replace(SyncPhase::BatchSelected { readings: batch.len() });

        // Retrying without a secret cannot succeed
        let secret = self
            .credentials
            .device_secret()
            .await?
            .ok_or(SyncError::NoDeviceSecret)?;

        // Signed once here; retries resend the exact same timestamp and signature
        let payload = WearableSyncPayload::new(batch, Utc::now());
        let processed = payload.readings.len();
        let signed = sign(&secret, &payload, Some(payload.uploaded_at))?;
        self.phase.send_replace(SyncPhase::Signed);

        self.upload_with_retry(&signed, max_retries).await?;

        self.queue.mark_batch_uploaded(&payload.readings).await?;
        self.phase.send_replace(SyncPhase::Success { processed });

        if let Err(e) = self.queue.record_last_sync(Utc::now()).await {
            warn!("Failed to record last sync time: {}", e);
        }

        Ok(processed)
    }

    async fn upload_with_retry(&self, signed: &SignedBody, max_retries: u32) -> Result<(), SyncError> {
        let mut last_error = SyncError::MaxRetriesExceeded;

        for attempt in 0..max_retries {
            self.phase.send_replace(SyncPhase::Uploading { attempt });

            let error = match self.transport.post_batch(signed).await {
                Ok(status) if (200..300).contains(&status) => {
                    debug!("Batch accepted on attempt {}", attempt + 1);
                    return Ok(());
                }
                Ok(status) if !is_retryable_status(status) => {
                    warn!("Batch rejected with status {}, not retrying", status);
                    return Err(SyncError::UploadFailedStatus(status));
                }
                Ok(status) => SyncError::UploadFailedStatus(status),
                Err(e) => SyncError::Network(e),
            };
            warn!("Upload attempt {} of {} failed: {}", attempt + 1, max_retries, error);
            last_error = error;

            if attempt + 1 < max_retries {
                let delay = backoff_delay(self.options.base_backoff, attempt);
                self.phase.send_replace(SyncPhase::Retry { attempt, delay });
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error)
    }
}
