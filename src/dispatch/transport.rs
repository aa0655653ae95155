use super::command_batcher::Batch;
use async_trait::async_trait;

/// Batch send failure reported by the transport collaborator. Treated as
/// transient: the batcher retries with bounded exponential backoff before
/// surfacing the failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Transport send failed: {reason}")]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Remote service collaborator. One call per batch; the batcher never has
/// two batches in flight at once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &Batch) -> Result<(), TransportError>;
}
