use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::device::credentials::CredentialError;
use crate::models::reading::ReadingValue;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Characteristic read failed: {0}")]
    Read(String),

    #[error("Credential lookup failed: {0}")]
    Credentials(#[from] CredentialError),
}

/// An advertisement seen during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDevice {
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// One value read from a connected wearable.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacteristicReading {
    pub metric_type: String,
    pub value: ReadingValue,
    pub unit: Option<String>,
}

/// The radio stack the discovery loop drives.
#[async_trait]
pub trait DeviceScanner: Send + Sync + 'static {
    /// Begin scanning. The stream yields advertisements until the scan is stopped.
    async fn start_scan(&self) -> Result<BoxStream<'static, DiscoveredDevice>, DiscoveryError>;

    async fn stop_scan(&self) -> Result<(), DiscoveryError>;

    async fn connect(&self, device_id: &str) -> Result<(), DiscoveryError>;

    /// Read at most `max_reads` characteristics from a connected device.
    async fn read_characteristics(
        &self,
        device_id: &str,
        max_reads: usize,
    ) -> Result<Vec<CharacteristicReading>, DiscoveryError>;

    async fn disconnect(&self, device_id: &str) -> Result<(), DiscoveryError>;
}
