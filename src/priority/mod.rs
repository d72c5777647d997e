//! Instrument priority model
//!
//! Decides which instruments deserve the scarce low-latency channel. The
//! score is a pure function of the inputs and is recomputed on every update.

mod queue;

pub use queue::PriorityQueue;

use chrono::{DateTime, Utc};

/// Score weight: instrument currently held in the portfolio
const WEIGHT_HOLDING: f64 = 40.0;
/// Score weight: instrument has a live order
const WEIGHT_ACTIVE_ORDER: f64 = 35.0;
/// Score weight: instrument actively watched by a user
const WEIGHT_WATCHING: f64 = 15.0;
/// Score weight ceiling for recent volatility
const WEIGHT_VOLATILITY: f64 = 5.0;
/// Score weight ceiling for trade recency
const WEIGHT_RECENCY: f64 = 5.0;
/// Window over which trade recency decays to zero
const RECENCY_WINDOW_SECS: f64 = 1800.0;

/// Per-instrument importance inputs and the derived score
#[derive(Debug, Clone)]
pub struct InstrumentPriority {
    /// Instrument code
    pub code: String,
    /// Currently held in the portfolio
    pub holding: bool,
    /// Has a live order
    pub active_order: bool,
    /// Actively watched by a user
    pub watching: bool,
    /// Recent volatility, normalized to [0, 1]
    pub volatility: f64,
    /// Time of the instrument's last observed trade
    pub last_traded: Option<DateTime<Utc>>,
    /// Derived importance score, max 100
    pub score: f64,
}

impl InstrumentPriority {
    /// Create a priority record with all inputs off and score 0
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            holding: false,
            active_order: false,
            watching: false,
            volatility: 0.0,
            last_traded: None,
            score: 0.0,
        }
    }

    /// Recompute the score from the current inputs
    ///
    /// Holding and live-order status dominate; volatility and recency
    /// contribute smaller additive terms. Maximum is 100.
    pub fn recompute(&mut self, now: DateTime<Utc>) {
        let mut score = 0.0;
        if self.holding {
            score += WEIGHT_HOLDING;
        }
        if self.active_order {
            score += WEIGHT_ACTIVE_ORDER;
        }
        if self.watching {
            score += WEIGHT_WATCHING;
        }
        score += WEIGHT_VOLATILITY * self.volatility.clamp(0.0, 1.0);
        if let Some(last) = self.last_traded {
            let age_secs = (now - last).num_seconds().max(0) as f64;
            let recency = (1.0 - age_secs / RECENCY_WINDOW_SECS).max(0.0);
            score += WEIGHT_RECENCY * recency;
        }
        self.score = score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_empty_priority_scores_zero() {
        let mut p = InstrumentPriority::new("005930");
        p.recompute(Utc::now());
        assert_eq!(p.score, 0.0);
    }

    #[test]
    fn test_holding_and_order_dominate() {
        let now = Utc::now();

        let mut held = InstrumentPriority::new("A");
        held.holding = true;
        held.recompute(now);

        let mut watched = InstrumentPriority::new("B");
        watched.watching = true;
        watched.volatility = 1.0;
        watched.last_traded = Some(now);
        watched.recompute(now);

        assert!(held.score > watched.score);
    }

    #[test]
    fn test_max_score_is_100() {
        let now = Utc::now();
        let mut p = InstrumentPriority::new("A");
        p.holding = true;
        p.active_order = true;
        p.watching = true;
        p.volatility = 2.5; // clamped to 1.0
        p.last_traded = Some(now);
        p.recompute(now);
        assert_eq!(p.score, 100.0);
    }

    #[test]
    fn test_recency_decays() {
        let now = Utc::now();

        let mut fresh = InstrumentPriority::new("A");
        fresh.last_traded = Some(now);
        fresh.recompute(now);

        let mut old = InstrumentPriority::new("B");
        old.last_traded = Some(now - Duration::minutes(15));
        old.recompute(now);

        let mut expired = InstrumentPriority::new("C");
        expired.last_traded = Some(now - Duration::hours(2));
        expired.recompute(now);

        assert!(fresh.score > old.score);
        assert!(old.score > 0.0);
        assert_eq!(expired.score, 0.0);
    }

    #[test]
    fn test_score_recomputed_not_accumulated() {
        let now = Utc::now();
        let mut p = InstrumentPriority::new("A");
        p.holding = true;
        p.recompute(now);
        let first = p.score;
        p.recompute(now);
        assert_eq!(p.score, first);

        p.holding = false;
        p.recompute(now);
        assert_eq!(p.score, 0.0);
    }
}
