use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::device::credentials::CredentialStore;
use crate::device::discovery::scanner::{DeviceScanner, DiscoveredDevice, DiscoveryError};
use crate::device::discovery::session::{ConnectionSession, ConnectionState};
use crate::device::queue::LocalQueue;
use crate::models::reading::{ReadingValue, WearableReading, DEVICE_DISCOVERED};

#[derive(Debug, Clone)]
pub struct AutoConnectOptions {
    /// Pause between a finished cycle and the next scan.
    pub rescan_delay: Duration,
    /// Longest a single scan runs before the loop re-checks whether it should stop.
    pub scan_window: Duration,
    /// Characteristic reads per connection.
    pub max_reads: usize,
}

impl Default for AutoConnectOptions {
    fn default() -> Self {
        Self {
            rescan_delay: Duration::from_secs(5),
            scan_window: Duration::from_secs(30),
            max_reads: 8,
        }
    }
}

/// Keeps a best-effort link to the one provisioned wearable and queues
/// whatever it reads.
pub struct AutoConnect {
    cycle: Arc<DiscoveryCycle>,
    credentials: Arc<dyn CredentialStore>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct DiscoveryCycle {
    scanner: Arc<dyn DeviceScanner>,
    queue: LocalQueue,
    session: Arc<ConnectionSession>,
    running: AtomicBool,
    stop_signal: Notify,
    options: AutoConnectOptions,
}

impl AutoConnect {
    pub fn new(
        scanner: Arc<dyn DeviceScanner>,
        queue: LocalQueue,
        credentials: Arc<dyn CredentialStore>,
        options: AutoConnectOptions,
    ) -> Self {
        Self {
            cycle: Arc::new(DiscoveryCycle {
                scanner,
                queue,
                session: Arc::new(ConnectionSession::new()),
                running: AtomicBool::new(false),
                stop_signal: Notify::new(),
                options,
            }),
            credentials,
            task: Mutex::new(None),
        }
    }

    pub fn session(&self) -> Arc<ConnectionSession> {
        self.cycle.session.clone()
    }

    pub fn is_running(&self) -> bool {
        self.cycle.running.load(Ordering::Acquire)
    }

    /// Start the loop. Returns `false` when it was already running or no
    /// device is provisioned.
    pub async fn start(&self) -> Result<bool, DiscoveryError> {
        let mut task = self.task.lock().await;
        // A panicked loop never clears the flag, so a finished task does not count
        let finished = task.as_ref().is_some_and(|handle| handle.is_finished());
        if self.is_running() && !finished {
            debug!("Auto-connect already running");
            return Ok(false);
        }

        // A stopped loop may still be finishing its last cycle
        if let Some(previous) = task.take() {
            if let Err(e) = previous.await {
                warn!("Previous auto-connect task ended abnormally: {}", e);
            }
        }

        self.cycle.running.store(false, Ordering::Release);

        let Some(device_id) = self.credentials.device_id().await? else {
            info!("No provisioned device, auto-connect stays stopped");
            return Ok(false);
        };

        self.cycle.running.store(true, Ordering::Release);
        let cycle = self.cycle.clone();
        *task = Some(tokio::spawn(async move { cycle.run(device_id).await }));

        info!("Auto-connect started");
        Ok(true)
    }

    /// Ask the loop to stop. A cycle already connecting may still finish.
    pub async fn stop(&self) {
        self.cycle.running.store(false, Ordering::Release);
        self.cycle.stop_signal.notify_waiters();
        if let Err(e) = self.cycle.scanner.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
    }

    /// Wait for the loop task to exit after `stop`.
    pub async fn join(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Auto-connect task ended abnormally: {}", e);
            }
        }
    }
}

impl DiscoveryCycle {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    async fn run(&self, device_id: String) {
        while self.is_running() {
            self.session.transition(ConnectionState::Scanning);

            match self.scan_for(&device_id).await {
                Ok(Some(device)) => {
                    self.record_discovery(&device).await;
                    if let Err(e) = self.connect_and_read(&device).await {
                        warn!("Connection cycle failed: {}", e);
                    }
                }
                Ok(None) => debug!("Scan window closed without a match"),
                Err(e) => warn!("Scan failed: {}", e),
            }

            if !self.is_running() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.options.rescan_delay) => {}
                _ = self.stop_signal.notified() => {}
            }
        }

        self.session.transition(ConnectionState::Stopped);
        info!("Auto-connect stopped");
    }

    /// Scan until the provisioned device shows up, the window closes, or the
    /// loop is stopped. The scan is always stopped before returning.
    async fn scan_for(&self, device_id: &str) -> Result<Option<DiscoveredDevice>, DiscoveryError> {
        let mut advertisements = self.scanner.start_scan().await?;

        let matched = tokio::select! {
            found = tokio::time::timeout(self.options.scan_window, async {
                while let Some(device) = advertisements.next().await {
                    if device.id == device_id {
                        return Some(device);
                    }
                }
                None
            }) => found.unwrap_or(None),
            _ = self.stop_signal.notified() => None,
        };

        if let Err(e) = self.scanner.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
        Ok(matched)
    }

    async fn connect_and_read(&self, device: &DiscoveredDevice) -> Result<(), DiscoveryError> {
        let device_id = device.id.clone();
        self.session.transition(ConnectionState::Connecting { device_id: device_id.clone() });
        self.scanner.connect(&device_id).await?;
        self.session.transition(ConnectionState::Connected { device_id: device_id.clone() });

        let result = self.read_and_enqueue(device).await;

        self.session.transition(ConnectionState::Disconnecting { device_id: device_id.clone() });
        if let Err(e) = self.scanner.disconnect(&device_id).await {
            warn!("Disconnect failed: {}", e);
        }
        result
    }

    /// Queue the sighting itself before any connection attempt can fail.
    async fn record_discovery(&self, device: &DiscoveredDevice) {
        let reading = WearableReading::new(
            device.id.as_str(),
            DEVICE_DISCOVERED,
            ReadingValue::Structured(json!({ "name": device.name, "rssi": device.rssi })),
            None,
            Utc::now(),
        );
        if let Err(e) = self.queue.enqueue(&reading).await {
            warn!("Failed to queue {} reading: {}", DEVICE_DISCOVERED, e);
        }
    }

    async fn read_and_enqueue(&self, device: &DiscoveredDevice) -> Result<(), DiscoveryError> {
        let characteristics = self
            .scanner
            .read_characteristics(&device.id, self.options.max_reads)
            .await?;
        let readings: Vec<WearableReading> = characteristics
            .into_iter()
            .take(self.options.max_reads)
            .map(|c| WearableReading::new(device.id.as_str(), c.metric_type, c.value, c.unit, Utc::now()))
            .collect();

        let mut queued = 0;
        for reading in &readings {
            match self.queue.enqueue(reading).await {
                Ok(()) => queued += 1,
                Err(e) => warn!("Failed to queue {} reading: {}", reading.metric_type, e),
            }
        }
        debug!("Queued {} of {} readings", queued, readings.len());
        Ok(())
    }
}
