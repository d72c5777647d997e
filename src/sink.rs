//! Outbound persistence hand-off
//!
//! Accepted prices are drained toward durable storage in point-in-time
//! batches. Delivery is fire-and-forget with logged failure; the cache
//! still holds the values, so the next cycle retries implicitly.

use crate::feed::PriceTick;
use async_trait::async_trait;

/// Durable-storage collaborator
#[async_trait]
pub trait TickSink: Send + Sync {
    /// Hand off one batch of fresh ticks
    async fn enqueue_batch(&self, ticks: &[PriceTick]) -> anyhow::Result<()>;
}

/// Sink that only logs, for running without a storage backend
pub struct LoggingSink;

#[async_trait]
impl TickSink for LoggingSink {
    async fn enqueue_batch(&self, ticks: &[PriceTick]) -> anyhow::Result<()> {
        tracing::debug!(batch = ticks.len(), "discarding tick batch (no sink configured)");
        Ok(())
    }
}
