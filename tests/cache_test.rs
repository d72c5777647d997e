//! Integration tests for the price cache conflict rule

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tickmux::cache::PriceCache;
use tickmux::feed::{PriceTick, Source};

fn tick_at(code: &str, price: Decimal, source: Source, ts: DateTime<Utc>) -> PriceTick {
    PriceTick {
        code: code.to_string(),
        price,
        change: dec!(0),
        change_rate: dec!(0),
        volume: 10,
        value: dec!(0),
        high: price,
        low: price,
        open: price,
        prev_close: price,
        timestamp: ts,
        source,
        stale: false,
    }
}

#[test]
fn test_equal_timestamp_push_beats_pull() {
    // Pull-feed tick for AAA at t=100, then a push-feed tick at the same
    // instant: the push value must win.
    let t100 = Utc.timestamp_opt(100, 0).unwrap();
    let cache = PriceCache::new(Duration::seconds(60));

    assert!(cache.update(tick_at("AAA", dec!(100), Source::Pull, t100)));
    assert!(cache.update(tick_at("AAA", dec!(101), Source::Push, t100)));

    let stored = cache.get("AAA").unwrap();
    assert_eq!(stored.price, dec!(101));
    assert_eq!(stored.source, Source::Push);
}

#[test]
fn test_timestamp_order_is_application_order_independent() {
    let t1 = Utc.timestamp_opt(100, 0).unwrap();
    let t2 = Utc.timestamp_opt(101, 0).unwrap();

    for (first, second) in [
        (
            tick_at("AAA", dec!(1), Source::Push, t1),
            tick_at("AAA", dec!(2), Source::Backup, t2),
        ),
        (
            tick_at("AAA", dec!(2), Source::Backup, t2),
            tick_at("AAA", dec!(1), Source::Push, t1),
        ),
    ] {
        let cache = PriceCache::new(Duration::seconds(60));
        cache.update(first);
        cache.update(second);
        assert_eq!(cache.get("AAA").unwrap().price, dec!(2));
    }
}

#[test]
fn test_backup_only_fills_gaps() {
    let now = Utc::now();
    let cache = PriceCache::new(Duration::seconds(60));

    // Backup populates an untracked instrument.
    assert!(cache.update(tick_at("GAP", dec!(5), Source::Backup, now)));

    // But never displaces a same-instant primary value.
    assert!(cache.update(tick_at("HOT", dec!(10), Source::Pull, now)));
    assert!(!cache.update(tick_at("HOT", dec!(9), Source::Backup, now)));
    assert_eq!(cache.get("HOT").unwrap().price, dec!(10));
}

#[test]
fn test_concurrent_writers_converge_to_newest() {
    use std::sync::Arc;
    use std::thread;

    let cache = Arc::new(PriceCache::new(Duration::seconds(60)));
    let base = Utc.timestamp_opt(1_000, 0).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|writer| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for step in 0..100i64 {
                    let ts = base + Duration::milliseconds(step * 10 + writer);
                    let price = Decimal::from(step * 10 + writer);
                    cache.update(tick_at("AAA", price, Source::Pull, ts));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // The winner is the tick with the greatest timestamp: step 99, writer 7.
    let stored = cache.get("AAA").unwrap();
    assert_eq!(stored.timestamp, base + Duration::milliseconds(997));
    assert_eq!(stored.price, dec!(997));
}

#[test]
fn test_clean_stale_then_stats() {
    let cache = PriceCache::new(Duration::seconds(10));
    cache.update(tick_at(
        "OLD",
        dec!(1),
        Source::Pull,
        Utc::now() - Duration::minutes(5),
    ));
    cache.update(tick_at("NEW", dec!(2), Source::Push, Utc::now()));

    let stats = cache.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.stale, 1);

    assert_eq!(cache.clean_stale(), 1);
    let stats = cache.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.stale, 0);
    assert_eq!(stats.by_source[&Source::Push], 1);
    assert!(!stats.by_source.contains_key(&Source::Pull));
}
