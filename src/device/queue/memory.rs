use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::device::queue::backend::QueueBackend;
use crate::device::queue::error::QueueError;
use crate::models::reading::WearableReading;

/// In-process queue backend for contexts without a database file.
#[derive(Clone, Default)]
pub struct MemoryQueueBackend {
    readings: Arc<RwLock<HashMap<String, WearableReading>>>,
    state: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored reading, uploaded or not.
    pub async fn all(&self) -> Vec<WearableReading> {
        let mut readings: Vec<WearableReading> = self.readings.read().await.values().cloned().collect();
        readings.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        readings
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    async fn initialize(&self) -> Result<(), QueueError> {
        Ok(())
    }

    async fn upsert(&self, reading: &WearableReading) -> Result<(), QueueError> {
        let mut readings = self.readings.write().await;
        let mut stored = reading.clone();
        stored.uploaded = false;
        stored.revision = readings.get(&reading.id).map_or(0, |existing| existing.revision + 1);
        readings.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<WearableReading>, QueueError> {
        let mut pending: Vec<WearableReading> = self
            .readings
            .read()
            .await
            .values()
            .filter(|r| !r.uploaded)
            .cloned()
            .collect();
        // Same ordering as the SQLite backend
        pending.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_uploaded(&self, ids: &[String]) -> Result<u64, QueueError> {
        let mut readings = self.readings.write().await;
        let mut updated = 0;
        for id in ids {
            if let Some(reading) = readings.get_mut(id) {
                reading.uploaded = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_selected_uploaded(&self, selected: &[WearableReading]) -> Result<u64, QueueError> {
        let mut readings = self.readings.write().await;
        let mut updated = 0;
        for sent in selected {
            if let Some(reading) = readings.get_mut(&sent.id) {
                if reading.revision == sent.revision {
                    reading.uploaded = true;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn pending_count(&self) -> Result<u64, QueueError> {
        Ok(self.readings.read().await.values().filter(|r| !r.uploaded).count() as u64)
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<(), QueueError> {
        self.state.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>, QueueError> {
        Ok(self.state.read().await.get(key).cloned())
    }
}
