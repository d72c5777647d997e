//! Backup poll feed
//!
//! Lowest-priority pull source, polled on a single slow cadence across an
//! externally-set symbol list. Exists for resilience when the primary
//! sources are degraded; ticks go through the same cache conflict rule,
//! so a backup value only ever fills a gap.

use crate::cache::PriceCache;
use crate::feed::{FeedEvent, PollSource};
use crate::poll::{poll_pass, RateLimiter};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Backup feed configuration
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Interval between polling passes
    pub interval: Duration,
    /// Token bucket capacity
    pub burst: u32,
    /// Token refill rate
    pub requests_per_sec: f64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            burst: 2,
            requests_per_sec: 0.5,
        }
    }
}

/// Slow-cadence resilience poller
pub struct BackupFeed {
    config: BackupConfig,
    symbols: RwLock<Vec<String>>,
    limiter: RateLimiter,
    source: Arc<dyn PollSource>,
    cache: Arc<PriceCache>,
    events: mpsc::Sender<FeedEvent>,
}

impl BackupFeed {
    /// Create a backup feed; `run` must be called to start it
    pub fn new(
        config: BackupConfig,
        source: Arc<dyn PollSource>,
        cache: Arc<PriceCache>,
        events: mpsc::Sender<FeedEvent>,
    ) -> Self {
        let limiter = RateLimiter::new(config.burst, config.requests_per_sec);
        Self {
            config,
            symbols: RwLock::new(Vec::new()),
            limiter,
            source,
            cache,
            events,
        }
    }

    /// Replace the polled symbol set
    pub fn set_symbols(&self, symbols: Vec<String>) {
        *self.symbols.write() = symbols;
    }

    /// Snapshot of the polled symbol set
    pub fn symbols(&self) -> Vec<String> {
        self.symbols.read().clone()
    }

    /// Poll until cancelled
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "backup feed started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("backup feed stopping");
                    return;
                }
                _ = interval.tick() => {}
            }

            let symbols = self.symbols.read().clone();
            if symbols.is_empty() {
                continue;
            }

            poll_pass(
                &*self.source,
                &self.cache,
                &symbols,
                &self.limiter,
                &cancel,
                &self.events,
            )
            .await;
        }
    }
}
