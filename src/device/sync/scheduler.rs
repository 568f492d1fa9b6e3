use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use crate::device::sync::orchestrator::SyncOrchestrator;

/// Runs background syncs on a fixed interval. Overlapping ticks are
/// harmless: the orchestrator turns them into `sync_in_progress` reports.
pub struct BackgroundSyncScheduler {
    scheduler: Arc<Mutex<JobScheduler>>,
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    job_id: Mutex<Option<Uuid>>,
}

impl BackgroundSyncScheduler {
    pub async fn new(orchestrator: Arc<SyncOrchestrator>, interval: Duration) -> Result<Self, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            orchestrator,
            interval,
            job_id: Mutex::new(None),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        let scheduler = self.scheduler.lock().await;

        let orchestrator = self.orchestrator.clone();
        let sync_job = Job::new_repeated_async(self.interval, move |_uuid, _l| {
            let orchestrator = orchestrator.clone();

            Box::pin(async move {
                tracing::debug!("Running scheduled background sync");
                let report = orchestrator.run_background_sync().await;
                match report.error.as_deref() {
                    None => tracing::info!("Background sync uploaded {} readings", report.processed),
                    Some("sync_in_progress") => tracing::debug!("Background sync skipped, sync already running"),
                    Some(error) => tracing::warn!("Background sync failed: {}", error),
                }
            })
        })?;

        let job_id = sync_job.guid();
        scheduler.add(sync_job).await?;
        scheduler.start().await?;
        *self.job_id.lock().await = Some(job_id);

        tracing::info!("Background sync scheduled every {}s", self.interval.as_secs());
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), JobSchedulerError> {
        if let Some(job_id) = self.job_id.lock().await.take() {
            let scheduler = self.scheduler.lock().await;
            scheduler.remove(&job_id).await?;
        }

        let mut scheduler = self.scheduler.lock().await;
        scheduler.shutdown().await?;

        tracing::info!("Background sync stopped");
        Ok(())
    }
}
