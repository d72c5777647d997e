//! Orchestrator
//!
//! Owns the cache, the priority queue, and every feed component. Periodically
//! recomputes which instruments occupy the push feed's limited capacity
//! versus each poll tier, and drains fresh cache entries toward durable
//! storage. Shutdown cancels one token and joins every spawned task.

use crate::auth::TokenProvider;
use crate::backup::{BackupConfig, BackupFeed};
use crate::cache::PriceCache;
use crate::feed::{FeedEvent, PollSource};
use crate::poll::{TierSettings, TieredScheduler};
use crate::priority::{InstrumentPriority, PriorityQueue};
use crate::push::{PushConfig, PushFeedManager};
use crate::sink::TickSink;
use crate::telemetry::metrics;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Orchestrator timing and threshold settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interval between tier reassignments
    pub rebalance_interval: Duration,
    /// Interval between sink drains
    pub sync_interval: Duration,
    /// Minimum score for the fast poll tier
    pub tier1_min_score: f64,
    /// Minimum score for the medium poll tier
    pub tier2_min_score: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rebalance_interval: Duration::from_secs(30),
            sync_interval: Duration::from_secs(5),
            tier1_min_score: 70.0,
            tier2_min_score: 40.0,
        }
    }
}

/// Assign every tracked instrument outside the push set to a poll tier
///
/// Returns (fast, medium, slow). Push-subscribed instruments are excluded,
/// so the four sets are pairwise disjoint by construction.
pub fn assign_tiers(
    scored: &[(String, f64)],
    push_set: &HashSet<String>,
    tier1_min: f64,
    tier2_min: f64,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut fast = Vec::new();
    let mut medium = Vec::new();
    let mut slow = Vec::new();
    for (code, score) in scored {
        if push_set.contains(code) {
            continue;
        }
        if *score >= tier1_min {
            fast.push(code.clone());
        } else if *score >= tier2_min {
            medium.push(code.clone());
        } else {
            slow.push(code.clone());
        }
    }
    (fast, medium, slow)
}

/// Ties the cache, queue, and feeds together and owns their lifecycle
pub struct Orchestrator {
    config: OrchestratorConfig,
    cache: Arc<PriceCache>,
    queue: Arc<PriorityQueue>,
    push: Arc<PushFeedManager>,
    scheduler: Arc<TieredScheduler>,
    backup: Arc<BackupFeed>,
    sink: Arc<dyn TickSink>,
    priorities: DashMap<String, InstrumentPriority>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    events_rx: Mutex<Option<mpsc::Receiver<FeedEvent>>>,
}

impl Orchestrator {
    /// Wire up every component; nothing runs until `start`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        push_config: PushConfig,
        tier_settings: [TierSettings; 3],
        backup_config: BackupConfig,
        cache: Arc<PriceCache>,
        pull_source: Arc<dyn PollSource>,
        backup_source: Arc<dyn PollSource>,
        tokens: Arc<dyn TokenProvider>,
        sink: Arc<dyn TickSink>,
    ) -> Self {
        let queue = Arc::new(PriorityQueue::new());
        let (events_tx, events_rx) = mpsc::channel(1024);

        let push = Arc::new(PushFeedManager::new(
            push_config,
            Arc::clone(&cache),
            Arc::clone(&queue),
            Arc::clone(&tokens),
            events_tx.clone(),
        ));
        let scheduler = Arc::new(TieredScheduler::new(
            tier_settings,
            pull_source,
            Arc::clone(&cache),
            events_tx.clone(),
        ));
        let backup = Arc::new(BackupFeed::new(
            backup_config,
            backup_source,
            Arc::clone(&cache),
            events_tx,
        ));

        Self {
            config,
            cache,
            queue,
            push,
            scheduler,
            backup,
            sink,
            priorities: DashMap::new(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Shared price cache
    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    /// Priority queue of tracked instruments
    pub fn queue(&self) -> &Arc<PriorityQueue> {
        &self.queue
    }

    /// Push-feed manager
    pub fn push(&self) -> &Arc<PushFeedManager> {
        &self.push
    }

    /// Tiered poll scheduler
    pub fn scheduler(&self) -> &Arc<TieredScheduler> {
        &self.scheduler
    }

    /// Backup poll feed
    pub fn backup(&self) -> &Arc<BackupFeed> {
        &self.backup
    }

    /// Start every feed component plus the rebalance and sync loops
    pub fn start(self: Arc<Self>) {
        let cancel = self.cancel.clone();
        let mut handles = Vec::new();

        handles.push(tokio::spawn(
            Arc::clone(&self.push).run(cancel.clone()),
        ));
        handles.extend(Arc::clone(&self.scheduler).spawn(cancel.clone()));
        handles.push(tokio::spawn(
            Arc::clone(&self.backup).run(cancel.clone()),
        ));

        if let Some(mut events_rx) = self.events_rx.lock().take() {
            let event_cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = event_cancel.cancelled() => return,
                        event = events_rx.recv() => {
                            match event {
                                Some(ev) => tracing::debug!(?ev, "feed event"),
                                None => return,
                            }
                        }
                    }
                }
            }));
        }

        let rebalance = Arc::clone(&self);
        let rebalance_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(rebalance.config.rebalance_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = rebalance_cancel.cancelled() => return,
                    _ = interval.tick() => rebalance.rebalance_once(),
                }
            }
        }));

        let sync = Arc::clone(&self);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(sync.config.sync_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => sync.sync_once().await,
                }
            }
        }));

        self.tasks.lock().extend(handles);
        tracing::info!("orchestrator started");
    }

    /// Reassign tiers for every tracked instrument not on the push feed
    pub fn rebalance_once(&self) {
        let scored: Vec<(String, f64)> = self
            .priorities
            .iter()
            .map(|entry| (entry.code.clone(), entry.score))
            .collect();
        let push_set = self.push.active_set();

        let (fast, medium, slow) = assign_tiers(
            &scored,
            &push_set,
            self.config.tier1_min_score,
            self.config.tier2_min_score,
        );
        tracing::debug!(
            push = push_set.len(),
            fast = fast.len(),
            medium = medium.len(),
            slow = slow.len(),
            "tier assignment"
        );
        self.scheduler.set_tiers(fast, medium, slow);
    }

    /// Drain fresh cache entries to the sink; failures wait for next cycle
    pub async fn sync_once(&self) {
        let batch: Vec<_> = self
            .cache
            .get_all()
            .into_iter()
            .filter(|tick| !tick.stale)
            .collect();
        metrics::cache_entries(self.cache.len());
        if batch.is_empty() {
            return;
        }

        if let Err(e) = self.sink.enqueue_batch(&batch).await {
            tracing::warn!(error = %e, batch = batch.len(), "sink enqueue failed");
        } else {
            tracing::debug!(batch = batch.len(), "synced ticks to sink");
        }
    }

    /// Mark an instrument as held in the portfolio
    pub fn add_portfolio_symbol(&self, code: &str) {
        self.upsert_priority(code, |p| p.holding = true);
    }

    /// Mark an instrument as having a live order
    pub fn add_active_order_symbol(&self, code: &str) {
        self.upsert_priority(code, |p| p.active_order = true);
    }

    /// Mark an instrument as actively watched by a user
    pub fn add_watching_symbol(&self, code: &str) {
        self.upsert_priority(code, |p| p.watching = true);
    }

    /// Record volatility and last-trade inputs for an instrument
    pub fn record_trade_activity(&self, code: &str, volatility: f64) {
        self.upsert_priority(code, |p| {
            p.volatility = volatility;
            p.last_traded = Some(Utc::now());
        });
    }

    /// Stop tracking an instrument entirely
    pub fn remove_symbol(&self, code: &str) {
        self.priorities.remove(code);
        self.queue.remove(code);
        self.push.poke();
    }

    /// Number of tracked instruments
    pub fn tracked_count(&self) -> usize {
        self.priorities.len()
    }

    fn upsert_priority(&self, code: &str, apply: impl FnOnce(&mut InstrumentPriority)) {
        let mut record = self
            .priorities
            .entry(code.to_string())
            .or_insert_with(|| InstrumentPriority::new(code));
        apply(&mut record);
        record.recompute(Utc::now());
        let score = record.score;
        drop(record);

        self.queue.update(code, score);
        self.push.poke();
    }

    /// Signal every loop to stop and wait for all of them to exit
    ///
    /// After this returns there are no dangling writers.
    pub async fn stop(&self) {
        tracing::info!("orchestrator stopping");
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "task join failed");
            }
        }
        tracing::info!("orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(c, s)| (c.to_string(), *s)).collect()
    }

    #[test]
    fn test_assign_tiers_by_threshold() {
        let scored = scored(&[("A", 95.0), ("B", 75.0), ("C", 55.0), ("D", 10.0)]);
        let (fast, medium, slow) = assign_tiers(&scored, &HashSet::new(), 70.0, 40.0);
        assert_eq!(fast, vec!["A", "B"]);
        assert_eq!(medium, vec!["C"]);
        assert_eq!(slow, vec!["D"]);
    }

    #[test]
    fn test_assign_tiers_excludes_push_set() {
        let scored = scored(&[("A", 95.0), ("B", 75.0), ("C", 55.0)]);
        let push_set: HashSet<String> = ["A".to_string()].into();
        let (fast, medium, slow) = assign_tiers(&scored, &push_set, 70.0, 40.0);
        assert_eq!(fast, vec!["B"]);
        assert_eq!(medium, vec!["C"]);
        assert!(slow.is_empty());

        // Pairwise disjoint with the push set by construction.
        for code in fast.iter().chain(&medium).chain(&slow) {
            assert!(!push_set.contains(code));
        }
    }

    #[test]
    fn test_assign_tiers_boundary_scores() {
        let scored = scored(&[("A", 70.0), ("B", 69.9), ("C", 40.0), ("D", 39.9)]);
        let (fast, medium, slow) = assign_tiers(&scored, &HashSet::new(), 70.0, 40.0);
        assert_eq!(fast, vec!["A"]);
        assert_eq!(medium, vec!["B", "C"]);
        assert_eq!(slow, vec!["D"]);
    }
}
