//! Feed model
//!
//! Tick and source types shared by every adapter, the minimal capability
//! trait for pull-style sources, and the typed event stream feeds publish
//! instead of callback registration.

mod types;

pub use types::{PriceTick, Source};

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced by feed adapters
#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport-level failure (connect, send, HTTP request)
    #[error("transport error: {0}")]
    Transport(String),
    /// Upstream answered with a non-success status
    #[error("upstream status {status}: {body}")]
    Status { status: u16, body: String },
    /// Message or payload that could not be decoded
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Minimal capability shared by pull-style sources
///
/// The cache-side consumer only needs "give me one tick for this code";
/// new sources plug in without touching the orchestrator.
#[async_trait]
pub trait PollSource: Send + Sync {
    /// Which feed this adapter represents
    fn source(&self) -> Source;

    /// Fetch one tick for the given instrument
    async fn fetch(&self, code: &str) -> Result<PriceTick, FeedError>;
}

/// Typed lifecycle and data events published by feed components
///
/// Delivered over an mpsc channel so consumers (and tests) can observe
/// what happened without closures capturing shared state.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A tick was accepted into the cache
    TickAccepted { source: Source, code: String },
    /// A tick lost conflict resolution and was dropped
    TickRejected { source: Source, code: String },
    /// Connection established
    Connected { source: Source },
    /// Connection lost
    Disconnected { source: Source },
    /// Reconnect attempt in progress
    Reconnecting { source: Source, attempt: u32 },
    /// A subscribe/unsubscribe control message failed
    SubscribeFailed { code: String, reason: String },
}
