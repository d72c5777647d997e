//! Shared price cache
//!
//! Holds the latest accepted tick per instrument. Conflicts between sources
//! are resolved by timestamp first, then by fixed source priority on an
//! exact timestamp tie. The map is sharded, so writers for different
//! instruments never block each other; no I/O happens under any lock.

use crate::feed::{PriceTick, Source};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;

/// Cache occupancy snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total entries
    pub total: usize,
    /// Entries within TTL
    pub fresh: usize,
    /// Entries past TTL
    pub stale: usize,
    /// Entry count per originating source
    pub by_source: HashMap<Source, usize>,
}

/// Concurrent store of the latest accepted tick per instrument
pub struct PriceCache {
    entries: DashMap<String, PriceTick>,
    ttl: Duration,
}

impl PriceCache {
    /// Create a cache with the given staleness TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Apply one tick, returning whether it was accepted
    ///
    /// Accepted if no prior tick exists for the instrument, the new tick is
    /// strictly newer, or the timestamps are equal and the new source has
    /// strictly higher priority. Rejection is a policy outcome, not an
    /// error; the stored value is left untouched.
    pub fn update(&self, tick: PriceTick) -> bool {
        match self.entries.entry(tick.code.clone()) {
            dashmap::Entry::Vacant(slot) => {
                slot.insert(tick);
                true
            }
            dashmap::Entry::Occupied(mut slot) => {
                let stored = slot.get();
                let accept = tick.timestamp > stored.timestamp
                    || (tick.timestamp == stored.timestamp
                        && tick.source.priority() > stored.source.priority());
                if accept {
                    slot.insert(tick);
                }
                accept
            }
        }
    }

    /// Latest tick for one instrument, stale flag recomputed against TTL
    pub fn get(&self, code: &str) -> Option<PriceTick> {
        let now = Utc::now();
        self.entries.get(code).map(|entry| {
            let mut tick = entry.clone();
            tick.stale = tick.age(now) > self.ttl;
            tick
        })
    }

    /// Latest ticks for a set of instruments; missing codes are skipped
    pub fn get_many(&self, codes: &[String]) -> Vec<PriceTick> {
        codes.iter().filter_map(|c| self.get(c)).collect()
    }

    /// Every cached tick, stale flags recomputed
    pub fn get_all(&self) -> Vec<PriceTick> {
        let now = Utc::now();
        self.entries
            .iter()
            .map(|entry| {
                let mut tick = entry.clone();
                tick.stale = tick.age(now) > self.ttl;
                tick
            })
            .collect()
    }

    /// Remove one instrument, returning whether it was present
    pub fn delete(&self, code: &str) -> bool {
        self.entries.remove(code).is_some()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Evict every entry older than TTL, returning how many were removed
    pub fn clean_stale(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, tick| tick.age(now) <= self.ttl);
        before - self.entries.len()
    }

    /// Total/fresh/stale counts plus a per-source breakdown
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let mut stats = CacheStats {
            total: 0,
            fresh: 0,
            stale: 0,
            by_source: HashMap::new(),
        };
        for entry in self.entries.iter() {
            stats.total += 1;
            if entry.age(now) > self.ttl {
                stats.stale += 1;
            } else {
                stats.fresh += 1;
            }
            *stats.by_source.entry(entry.source).or_insert(0) += 1;
        }
        stats
    }

    /// Number of cached instruments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
