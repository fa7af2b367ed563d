use crate::tracker::DueItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Bursts of tracking changes within this window coalesce into one write.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// The durable slice of a tracked post. Signatures and bucket membership are
/// derived state and deliberately not persisted; a restored post re-renders
/// once and reclassifies itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub channel_id: u64,
    pub message_id: u64,
    pub label: String,
    pub items: Vec<DueItem>,
}

#[derive(Debug, Error)]
#[error("snapshot store error: {0}")]
pub struct StoreError(pub String);

/// External storage for tracked-post snapshots. Best effort on both sides:
/// a failed save is retried by the next debounced write, a failed load means
/// starting with nothing tracked.
#[async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
    async fn load(&self) -> Result<Vec<SnapshotRecord>, StoreError>;
    async fn save(&self, records: &[SnapshotRecord]) -> Result<(), StoreError>;
}
