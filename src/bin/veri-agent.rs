use std::sync::Arc;
use std::time::Duration;

use veri_backend::config::agent::get_agent_config;
use veri_backend::device::credentials::StaticCredentials;
use veri_backend::device::queue::LocalQueue;
use veri_backend::device::sync::{BackgroundSyncScheduler, SyncOptions, SyncOrchestrator};
use veri_backend::device::transport::HttpTransport;
use veri_backend::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_agent_config()?;

    let subscriber = get_subscriber("veri-agent".into(), config.log_level.clone(), std::io::stdout);
    init_subscriber(subscriber);

    let queue = LocalQueue::open(&config.queue_database_url).await;
    queue.initialize().await?;
    tracing::info!("Local queue has {} readings waiting", queue.pending_count().await?);
    if let Some(last_sync) = queue.last_sync().await? {
        tracing::info!("Last successful sync at {}", last_sync);
    }

    if config.device_secret.is_none() {
        tracing::warn!("No device secret provisioned - syncs will fail until one is configured");
    }
    let credentials = Arc::new(StaticCredentials::new(config.device_id.clone(), config.device_secret.clone()));
    let transport = Arc::new(HttpTransport::new(
        config.ingest_url.clone(),
        Duration::from_secs(config.request_timeout_seconds),
    )?);

    let orchestrator = Arc::new(SyncOrchestrator::new(
        queue,
        credentials,
        transport,
        SyncOptions {
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            ..SyncOptions::default()
        },
    ));

    // Flush whatever is already queued before settling into the interval
    let report = orchestrator.run_foreground_sync(config.max_retries).await;
    tracing::info!(
        "Startup sync finished: success={} processed={} error={:?}",
        report.success,
        report.processed,
        report.error
    );

    let scheduler = BackgroundSyncScheduler::new(
        orchestrator.clone(),
        Duration::from_secs(config.sync_interval_seconds),
    )
    .await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down sync agent");
    scheduler.stop().await?;

    Ok(())
}
