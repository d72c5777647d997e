//! Tiered poll scheduler
//!
//! Three independently-ticking loops (fast/medium/slow) cover the
//! instruments not served by the push feed. Each loop has its own token
//! bucket; tiers share nothing but the upstream budget and the cache.

use super::limiter::RateLimiter;
use super::{Tier, TierSettings};
use crate::cache::PriceCache;
use crate::feed::{FeedEvent, PollSource};
use crate::telemetry::metrics;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct TierState {
    symbols: RwLock<Vec<String>>,
    limiter: RateLimiter,
    interval: std::time::Duration,
}

/// Runs the three tier loops against one pull source
pub struct TieredScheduler {
    tiers: [TierState; 3],
    source: Arc<dyn PollSource>,
    cache: Arc<PriceCache>,
    events: mpsc::Sender<FeedEvent>,
}

impl TieredScheduler {
    /// Create a scheduler with per-tier cadences and rate budgets
    pub fn new(
        settings: [TierSettings; 3],
        source: Arc<dyn PollSource>,
        cache: Arc<PriceCache>,
        events: mpsc::Sender<FeedEvent>,
    ) -> Self {
        let [fast, medium, slow] = settings;
        Self {
            tiers: [
                TierState::new(fast),
                TierState::new(medium),
                TierState::new(slow),
            ],
            source,
            cache,
            events,
        }
    }

    /// Atomically replace one tier's symbol set
    pub fn set_tier(&self, tier: Tier, symbols: Vec<String>) {
        *self.tiers[tier.index()].symbols.write() = symbols;
    }

    /// Replace all three tier sets in one call
    pub fn set_tiers(&self, fast: Vec<String>, medium: Vec<String>, slow: Vec<String>) {
        self.set_tier(Tier::Fast, fast);
        self.set_tier(Tier::Medium, medium);
        self.set_tier(Tier::Slow, slow);
    }

    /// Snapshot of one tier's symbol set
    pub fn tier_symbols(&self, tier: Tier) -> Vec<String> {
        self.tiers[tier.index()].symbols.read().clone()
    }

    /// Spawn the three tier loops
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        [Tier::Fast, Tier::Medium, Tier::Slow]
            .into_iter()
            .map(|tier| {
                let scheduler = Arc::clone(&self);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    scheduler.run_tier(tier, cancel).await;
                })
            })
            .collect()
    }

    async fn run_tier(&self, tier: Tier, cancel: CancellationToken) {
        let state = &self.tiers[tier.index()];
        let mut interval = tokio::time::interval(state.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(%tier, interval_secs = state.interval.as_secs(), "poll tier started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(%tier, "poll tier stopping");
                    return;
                }
                _ = interval.tick() => {}
            }

            // Snapshot so a mid-cycle swap applies on the next tick.
            let symbols = state.symbols.read().clone();
            if symbols.is_empty() {
                continue;
            }

            poll_pass(
                &*self.source,
                &self.cache,
                &symbols,
                &state.limiter,
                &cancel,
                &self.events,
            )
            .await;
        }
    }
}

impl TierState {
    fn new(settings: TierSettings) -> Self {
        Self {
            symbols: RwLock::new(Vec::new()),
            limiter: RateLimiter::new(settings.burst, settings.requests_per_sec),
            interval: settings.interval,
        }
    }
}

/// Fetch every symbol once, rate limited, writing results into the cache
///
/// A failed fetch is logged and skipped; it is retried only on the loop's
/// next natural tick. Shared with the backup feed.
pub(crate) async fn poll_pass(
    source: &dyn PollSource,
    cache: &PriceCache,
    symbols: &[String],
    limiter: &RateLimiter,
    cancel: &CancellationToken,
    events: &mpsc::Sender<FeedEvent>,
) {
    for code in symbols {
        if !limiter.acquire(cancel).await {
            // Shutdown while waiting on the bucket: clean early exit.
            return;
        }

        match source.fetch(code).await {
            Ok(tick) => {
                let kind = source.source();
                if cache.update(tick) {
                    metrics::tick_accepted(kind);
                    let _ = events.try_send(FeedEvent::TickAccepted {
                        source: kind,
                        code: code.clone(),
                    });
                } else {
                    metrics::tick_rejected(kind);
                    let _ = events.try_send(FeedEvent::TickRejected {
                        source: kind,
                        code: code.clone(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!(source = %source.source(), code, error = %e, "fetch failed, skipping");
            }
        }
    }
}
