use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::device::credentials::CredentialError;
use crate::device::queue::QueueError;
use crate::device::transport::TransportError;
use crate::utils::signature::SignatureError;

/// Why a sync attempt failed. `Display` is the short reason shown to users.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no_device_secret")]
    NoDeviceSecret,

    #[error("sync_in_progress")]
    InProgress,

    #[error("queue_error")]
    Queue(#[from] QueueError),

    #[error("credential_error")]
    Credentials(#[from] CredentialError),

    #[error("signing_failed")]
    Signing(#[from] SignatureError),

    #[error("upload_failed_status_{0}")]
    UploadFailedStatus(u16),

    #[error("network_error")]
    Network(#[source] TransportError),

    #[error("max_retries_exceeded")]
    MaxRetriesExceeded,
}

impl SyncError {
    /// Configuration problems need re-provisioning rather than another try.
    pub fn needs_provisioning(&self) -> bool {
        matches!(self, SyncError::NoDeviceSecret)
    }
}

/// Outcome of one sync run, shaped for the UI.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub success: bool,
    pub processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    pub fn succeeded(processed: usize) -> Self {
        Self { success: true, processed, error: None }
    }

    pub fn failed(error: &SyncError) -> Self {
        Self {
            success: false,
            processed: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Where the current sync attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    BatchSelected { readings: usize },
    Signed,
    Uploading { attempt: u32 },
    Retry { attempt: u32, delay: Duration },
    Success { processed: usize },
    Failed,
}
