use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;

use crate::utils::signature::{SignedBody, SIGNATURE_HEADER, TIMESTAMP_HEADER};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Sends one signed batch to the ingestion endpoint and reports the HTTP status.
#[async_trait]
pub trait UploadTransport: Send + Sync + 'static {
    async fn post_batch(&self, signed: &SignedBody) -> Result<u16, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    ingest_url: String,
}

impl HttpTransport {
    pub fn new(ingest_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            client,
            ingest_url: ingest_url.into(),
        })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn post_batch(&self, signed: &SignedBody) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(&self.ingest_url)
            .header(CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, &signed.timestamp)
            .header(SIGNATURE_HEADER, &signed.signature)
            .body(signed.body.clone())
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}
