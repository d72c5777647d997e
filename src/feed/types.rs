//! Price tick and source types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upstream feed that produced a tick
///
/// The ordering is fixed by reliability and latency and is used as the
/// tie-breaker when two ticks for the same instrument carry the same
/// timestamp. It never changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Low-latency push feed (WebSocket)
    Push,
    /// Rate-limited pull feed (REST)
    Pull,
    /// Tertiary backup pull feed
    Backup,
}

impl Source {
    /// Fixed priority ranking: push > pull > backup
    pub fn priority(&self) -> u8 {
        match self {
            Source::Push => 3,
            Source::Pull => 2,
            Source::Backup => 1,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Push => write!(f, "push"),
            Source::Pull => write!(f, "pull"),
            Source::Backup => write!(f, "backup"),
        }
    }
}

/// One instrument's price snapshot from a single source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    /// Instrument code (e.g., "005930")
    pub code: String,
    /// Last traded price
    pub price: Decimal,
    /// Absolute change versus previous close
    pub change: Decimal,
    /// Percentage change versus previous close
    pub change_rate: Decimal,
    /// Volume of the latest trade
    pub volume: u64,
    /// Accumulated traded value
    pub value: Decimal,
    /// Session high
    pub high: Decimal,
    /// Session low
    pub low: Decimal,
    /// Session open
    pub open: Decimal,
    /// Previous session close
    pub prev_close: Decimal,
    /// Tick timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    /// Originating feed
    pub source: Source,
    /// Whether the tick is older than the cache TTL, recomputed on read
    pub stale: bool,
}

impl PriceTick {
    /// Age of the tick relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }
}
