//! Tiered pull feed
//!
//! Covers every tracked instrument not on the push feed with three
//! independently-scheduled, rate-limited polling loops.

mod client;
mod limiter;
mod scheduler;

pub use client::{QuoteClient, QuoteClientConfig};
pub use limiter::RateLimiter;
pub use scheduler::TieredScheduler;

pub(crate) use scheduler::poll_pass;

use std::time::Duration;

/// Polling cadence assigned to an instrument by score threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Fast cadence for high-score instruments
    Fast,
    /// Medium cadence
    Medium,
    /// Slow cadence for everything else tracked
    Slow,
}

impl Tier {
    /// Array slot for this tier
    pub fn index(&self) -> usize {
        match self {
            Tier::Fast => 0,
            Tier::Medium => 1,
            Tier::Slow => 2,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Fast => write!(f, "fast"),
            Tier::Medium => write!(f, "medium"),
            Tier::Slow => write!(f, "slow"),
        }
    }
}

/// Cadence and rate budget for one tier
#[derive(Debug, Clone)]
pub struct TierSettings {
    /// Interval between polling passes
    pub interval: Duration,
    /// Token bucket capacity
    pub burst: u32,
    /// Token refill rate
    pub requests_per_sec: f64,
}
