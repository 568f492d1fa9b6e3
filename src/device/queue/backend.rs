use async_trait::async_trait;

use crate::device::queue::error::QueueError;
use crate::models::reading::WearableReading;

/// Durable storage behind the local reading queue.
#[async_trait]
pub trait QueueBackend: Send + Sync + 'static {
    /// Create tables if they do not exist. Safe to call repeatedly.
    async fn initialize(&self) -> Result<(), QueueError>;

    /// Insert or replace a reading by id. The stored copy is marked not uploaded.
    async fn upsert(&self, reading: &WearableReading) -> Result<(), QueueError>;

    /// Up to `limit` readings not yet uploaded, oldest observation first.
    async fn pending(&self, limit: usize) -> Result<Vec<WearableReading>, QueueError>;

    /// Flag the given readings as uploaded. Returns how many rows changed.
    async fn mark_uploaded(&self, ids: &[String]) -> Result<u64, QueueError>;

    /// Flag readings as uploaded only where the stored revision still matches
    /// the one selected. A reading replaced since selection stays pending.
    async fn mark_selected_uploaded(&self, selected: &[WearableReading]) -> Result<u64, QueueError>;

    async fn pending_count(&self) -> Result<u64, QueueError>;

    async fn set_state(&self, key: &str, value: &str) -> Result<(), QueueError>;

    async fn get_state(&self, key: &str) -> Result<Option<String>, QueueError>;
}
