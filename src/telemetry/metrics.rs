//! Prometheus metrics

use crate::feed::Source;

/// Count one tick accepted into the cache
pub fn tick_accepted(source: Source) {
    metrics::counter!("tickmux_ticks_accepted_total", "source" => source.to_string()).increment(1);
}

/// Count one tick dropped by conflict resolution
pub fn tick_rejected(source: Source) {
    metrics::counter!("tickmux_ticks_rejected_total", "source" => source.to_string()).increment(1);
}

/// Current size of the push-feed subscription set
pub fn push_subscriptions(count: usize) {
    metrics::gauge!("tickmux_push_subscriptions").set(count as f64);
}

/// Current number of cached instruments
pub fn cache_entries(count: usize) {
    metrics::gauge!("tickmux_cache_entries").set(count as f64);
}
