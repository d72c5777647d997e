//! Integration tests for tier assignment and the orchestrator lifecycle

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use tickmux::auth::StaticToken;
use tickmux::backup::BackupConfig;
use tickmux::cache::PriceCache;
use tickmux::feed::{FeedError, PollSource, PriceTick, Source};
use tickmux::orchestrator::{assign_tiers, Orchestrator, OrchestratorConfig};
use tickmux::poll::{Tier, TierSettings};
use tickmux::priority::PriorityQueue;
use tickmux::push::{plan_rebalance, PushConfig, SocketConfig};
use tickmux::sink::TickSink;

struct IdleSource(Source);

#[async_trait]
impl PollSource for IdleSource {
    fn source(&self) -> Source {
        self.0
    }

    async fn fetch(&self, _code: &str) -> Result<PriceTick, FeedError> {
        Err(FeedError::Transport("not wired in this test".into()))
    }
}

#[derive(Default)]
struct CapturingSink {
    batches: Mutex<Vec<Vec<PriceTick>>>,
}

#[async_trait]
impl TickSink for CapturingSink {
    async fn enqueue_batch(&self, ticks: &[PriceTick]) -> anyhow::Result<()> {
        self.batches.lock().push(ticks.to_vec());
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl TickSink for FailingSink {
    async fn enqueue_batch(&self, _ticks: &[PriceTick]) -> anyhow::Result<()> {
        anyhow::bail!("storage unavailable")
    }
}

fn tick(code: &str, age: chrono::Duration) -> PriceTick {
    PriceTick {
        code: code.to_string(),
        price: dec!(100),
        change: dec!(0),
        change_rate: dec!(0),
        volume: 1,
        value: dec!(0),
        high: dec!(100),
        low: dec!(100),
        open: dec!(100),
        prev_close: dec!(100),
        timestamp: Utc::now() - age,
        source: Source::Pull,
        stale: false,
    }
}

fn orchestrator(push_url: &str, sink: Arc<dyn TickSink>) -> Orchestrator {
    let tier = |interval_secs| TierSettings {
        interval: Duration::from_secs(interval_secs),
        burst: 5,
        requests_per_sec: 100.0,
    };
    Orchestrator::new(
        OrchestratorConfig {
            rebalance_interval: Duration::from_secs(600),
            sync_interval: Duration::from_secs(600),
            tier1_min_score: 70.0,
            tier2_min_score: 40.0,
        },
        PushConfig {
            socket: SocketConfig {
                url: push_url.to_string(),
                max_connect_attempts: 1,
                initial_reconnect_delay: Duration::from_millis(10),
                max_reconnect_delay: Duration::from_millis(20),
                ..Default::default()
            },
            capacity: 40,
            quote_tr_id: "QUOTE0".to_string(),
            rebalance_interval: Duration::from_secs(600),
        },
        [tier(600), tier(600), tier(600)],
        BackupConfig {
            interval: Duration::from_secs(600),
            ..Default::default()
        },
        Arc::new(PriceCache::new(chrono::Duration::seconds(60))),
        Arc::new(IdleSource(Source::Pull)),
        Arc::new(IdleSource(Source::Backup)),
        Arc::new(StaticToken::new("key")),
        sink,
    )
}

#[test]
fn test_scarce_push_capacity_goes_to_highest_scores() {
    // 45 tracked instruments competing for 40 push slots.
    let queue = PriorityQueue::new();
    let mut scored = Vec::new();
    for i in 0..40u32 {
        let code = format!("P{i:02}");
        let score = 90.0 - i as f64;
        queue.update(&code, score);
        scored.push((code, score));
    }
    for (code, score) in [("X1", 45.0), ("X2", 42.0), ("X3", 20.0), ("X4", 10.0), ("X5", 5.0)] {
        queue.update(code, score);
        scored.push((code.to_string(), score));
    }

    let top = queue.get_top(40);
    assert_eq!(top.len(), 40);
    // Strictly the 40 highest, in non-increasing score order.
    for pair in top.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
    assert!(top.iter().all(|(_, score)| *score >= 51.0));
    assert!(top.iter().all(|(code, _)| !code.starts_with('X')));

    // Everything the push feed takes gets subscribed; nothing else does.
    let desired: Vec<String> = top.into_iter().map(|(code, _)| code).collect();
    let (unsub, sub) = plan_rebalance(&HashSet::new(), &desired);
    assert!(unsub.is_empty());
    assert_eq!(sub.len(), 40);

    // The five losers fall to poll tiers by score threshold.
    let push_set: HashSet<String> = desired.into_iter().collect();
    let (fast, medium, slow) = assign_tiers(&scored, &push_set, 70.0, 40.0);
    assert!(fast.is_empty());
    assert_eq!(medium, vec!["X1", "X2"]);
    assert_eq!(slow, vec!["X3", "X4", "X5"]);
    for code in medium.iter().chain(&slow) {
        assert!(!push_set.contains(code));
    }
}

#[tokio::test]
async fn test_intake_drives_tier_assignment() {
    let orch = orchestrator("wss://unused.invalid", Arc::new(CapturingSink::default()));

    // holding 40 + active order 35 = 75: fast tier material.
    orch.add_portfolio_symbol("HOT");
    orch.add_active_order_symbol("HOT");
    // holding alone = 40: medium.
    orch.add_portfolio_symbol("HELD");
    // watching alone = 15: slow.
    orch.add_watching_symbol("IDLE");
    assert_eq!(orch.tracked_count(), 3);

    // The push feed is not connected, so every instrument polls.
    orch.rebalance_once();
    assert_eq!(orch.scheduler().tier_symbols(Tier::Fast), vec!["HOT"]);
    assert_eq!(orch.scheduler().tier_symbols(Tier::Medium), vec!["HELD"]);
    assert_eq!(orch.scheduler().tier_symbols(Tier::Slow), vec!["IDLE"]);

    // Dropping an instrument removes it from the next assignment.
    orch.remove_symbol("HELD");
    assert_eq!(orch.tracked_count(), 2);
    orch.rebalance_once();
    assert!(orch.scheduler().tier_symbols(Tier::Medium).is_empty());
    assert!(orch.queue().get_top(10).iter().all(|(code, _)| code != "HELD"));

    // Re-adding a removed instrument must track it again from scratch.
    orch.add_portfolio_symbol("HELD");
    assert_eq!(orch.tracked_count(), 3);
    orch.rebalance_once();
    assert_eq!(orch.scheduler().tier_symbols(Tier::Medium), vec!["HELD"]);
}

#[tokio::test]
async fn test_trade_activity_raises_score() {
    let orch = orchestrator("wss://unused.invalid", Arc::new(CapturingSink::default()));

    orch.add_portfolio_symbol("AAA");
    let before = orch.queue().get_top(1)[0].1;

    // Fresh volatile trading adds up to 10 points on top of the holding
    // weight, but stays within the medium band on its own.
    orch.record_trade_activity("AAA", 1.0);
    let after = orch.queue().get_top(1)[0].1;
    assert!(after > before);
    orch.rebalance_once();
    assert_eq!(orch.scheduler().tier_symbols(Tier::Medium), vec!["AAA"]);

    // A live order crosses the fast threshold.
    orch.add_active_order_symbol("AAA");
    orch.rebalance_once();
    assert_eq!(orch.scheduler().tier_symbols(Tier::Fast), vec!["AAA"]);
    assert!(orch.scheduler().tier_symbols(Tier::Medium).is_empty());
}

#[tokio::test]
async fn test_sync_drains_only_fresh_entries() {
    let sink = Arc::new(CapturingSink::default());
    let orch = orchestrator("wss://unused.invalid", Arc::clone(&sink) as Arc<dyn TickSink>);

    orch.cache().update(tick("FRESH", chrono::Duration::seconds(1)));
    orch.cache().update(tick("OLD", chrono::Duration::minutes(10)));

    orch.sync_once().await;

    let batches = sink.batches.lock();
    assert_eq!(batches.len(), 1);
    let codes: Vec<&str> = batches[0].iter().map(|t| t.code.as_str()).collect();
    assert_eq!(codes, vec!["FRESH"]);
}

#[tokio::test]
async fn test_sync_failure_keeps_cache_for_retry() {
    let orch = orchestrator("wss://unused.invalid", Arc::new(FailingSink));
    orch.cache().update(tick("AAA", chrono::Duration::seconds(1)));

    // The failure is logged, not propagated; the entry stays for the next
    // cycle.
    orch.sync_once().await;
    assert!(orch.cache().get("AAA").is_some());
}

#[tokio::test]
async fn test_empty_cache_skips_sink() {
    let sink = Arc::new(CapturingSink::default());
    let orch = orchestrator("wss://unused.invalid", Arc::clone(&sink) as Arc<dyn TickSink>);
    orch.sync_once().await;
    assert!(sink.batches.lock().is_empty());
}

#[tokio::test]
async fn test_stop_joins_every_task() {
    let orch = Arc::new(orchestrator(
        // Unroutable loopback port: the push transport fails fast and the
        // single-attempt ceiling stops it from retrying forever.
        "ws://127.0.0.1:9",
        Arc::new(CapturingSink::default()),
    ));
    orch.add_portfolio_symbol("AAA");
    Arc::clone(&orch).start();

    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(5), orch.stop())
        .await
        .expect("stop did not join all tasks");
}
