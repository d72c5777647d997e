//! Configuration types for tickmux

use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub push: PushSection,
    pub poll: PollSection,
    #[serde(default)]
    pub backup: BackupSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub universe: UniverseSection,
}

/// Push-feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PushSection {
    /// WebSocket URL
    pub url: String,
    /// Vendor ceiling on concurrent subscriptions
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Tick-stream transaction id
    #[serde(default = "default_quote_tr_id")]
    pub quote_tr_id: String,
    /// Liveness probe interval (seconds)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    /// Liveness response deadline (seconds)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
    /// Initial reconnect delay (milliseconds)
    #[serde(default = "default_initial_reconnect_ms")]
    pub initial_reconnect_delay_ms: u64,
    /// Reconnect delay cap (seconds)
    #[serde(default = "default_max_reconnect")]
    pub max_reconnect_delay_secs: u64,
    /// Attempt ceiling for the initial connect (0 = infinite)
    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,
    /// Subscription rebalance interval (seconds)
    #[serde(default = "default_push_rebalance")]
    pub rebalance_interval_secs: u64,
}

fn default_capacity() -> usize {
    40
}
fn default_quote_tr_id() -> String {
    "QUOTE0".to_string()
}
fn default_ping_interval() -> u64 {
    20
}
fn default_pong_timeout() -> u64 {
    60
}
fn default_initial_reconnect_ms() -> u64 {
    500
}
fn default_max_reconnect() -> u64 {
    30
}
fn default_max_connect_attempts() -> u32 {
    10
}
fn default_push_rebalance() -> u64 {
    10
}

/// Pull-feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollSection {
    /// REST base URL
    pub base_url: String,
    /// Request timeout (seconds)
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "TierSection::fast")]
    pub fast: TierSection,
    #[serde(default = "TierSection::medium")]
    pub medium: TierSection,
    #[serde(default = "TierSection::slow")]
    pub slow: TierSection,
}

fn default_poll_timeout() -> u64 {
    10
}

/// Cadence and rate budget for one poll tier
#[derive(Debug, Clone, Deserialize)]
pub struct TierSection {
    /// Interval between polling passes (seconds)
    pub interval_secs: u64,
    /// Token bucket capacity
    pub burst: u32,
    /// Token refill rate
    pub requests_per_sec: f64,
}

impl TierSection {
    fn fast() -> Self {
        Self {
            interval_secs: 2,
            burst: 5,
            requests_per_sec: 2.0,
        }
    }

    fn medium() -> Self {
        Self {
            interval_secs: 10,
            burst: 5,
            requests_per_sec: 1.0,
        }
    }

    fn slow() -> Self {
        Self {
            interval_secs: 30,
            burst: 5,
            requests_per_sec: 0.5,
        }
    }
}

/// Backup-feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackupSection {
    /// REST base URL; empty disables the backup feed
    #[serde(default)]
    pub base_url: String,
    /// Interval between polling passes (seconds)
    #[serde(default = "default_backup_interval")]
    pub interval_secs: u64,
    /// Token bucket capacity
    #[serde(default = "default_backup_burst")]
    pub burst: u32,
    /// Token refill rate
    #[serde(default = "default_backup_rate")]
    pub requests_per_sec: f64,
}

fn default_backup_interval() -> u64 {
    60
}
fn default_backup_burst() -> u32 {
    2
}
fn default_backup_rate() -> f64 {
    0.5
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            interval_secs: default_backup_interval(),
            burst: default_backup_burst(),
            requests_per_sec: default_backup_rate(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Staleness TTL (seconds)
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { ttl_secs: 60 }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// Tier reassignment interval (seconds)
    #[serde(default = "default_rebalance_interval")]
    pub rebalance_interval_secs: u64,
    /// Sink drain interval (seconds)
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    /// Minimum score for the fast poll tier
    #[serde(default = "default_tier1_min")]
    pub tier1_min_score: f64,
    /// Minimum score for the medium poll tier
    #[serde(default = "default_tier2_min")]
    pub tier2_min_score: f64,
}

fn default_rebalance_interval() -> u64 {
    30
}
fn default_sync_interval() -> u64 {
    5
}
fn default_tier1_min() -> f64 {
    70.0
}
fn default_tier2_min() -> f64 {
    40.0
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            rebalance_interval_secs: default_rebalance_interval(),
            sync_interval_secs: default_sync_interval(),
            tier1_min_score: default_tier1_min(),
            tier2_min_score: default_tier2_min(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub metrics_port: u16,
    pub log_level: String,
}

/// Seed symbol sets applied at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UniverseSection {
    /// Instruments held in the portfolio
    #[serde(default)]
    pub portfolio: Vec<String>,
    /// Instruments on the user watchlist
    #[serde(default)]
    pub watching: Vec<String>,
    /// Instruments polled by the backup feed
    #[serde(default)]
    pub backup: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl PushSection {
    /// Liveness probe interval
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Liveness response deadline
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [push]
        url = "wss://push.example.com/stream"

        [poll]
        base_url = "https://api.example.com"

        [telemetry]
        metrics_port = 9090
        log_level = "info"
    "#;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.push.capacity, 40);
        assert_eq!(config.push.quote_tr_id, "QUOTE0");
        assert_eq!(config.poll.fast.interval_secs, 2);
        assert_eq!(config.poll.slow.requests_per_sec, 0.5);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.orchestrator.tier1_min_score, 70.0);
        assert!(config.universe.portfolio.is_empty());
        assert!(config.backup.base_url.is_empty());
    }

    #[test]
    fn test_full_config_overrides() {
        let toml = r#"
            [push]
            url = "wss://push.example.com/stream"
            capacity = 20
            ping_interval_secs = 15
            max_connect_attempts = 3

            [poll]
            base_url = "https://api.example.com"

            [poll.fast]
            interval_secs = 1
            burst = 10
            requests_per_sec = 5.0

            [backup]
            base_url = "https://backup.example.com"
            interval_secs = 120

            [cache]
            ttl_secs = 30

            [orchestrator]
            rebalance_interval_secs = 15
            tier1_min_score = 80.0

            [telemetry]
            metrics_port = 9090
            log_level = "debug"

            [universe]
            portfolio = ["005930", "000660"]
            watching = ["035720"]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.push.capacity, 20);
        assert_eq!(config.push.ping_interval(), Duration::from_secs(15));
        assert_eq!(config.poll.fast.requests_per_sec, 5.0);
        assert_eq!(config.poll.medium.interval_secs, 10);
        assert_eq!(config.backup.base_url, "https://backup.example.com");
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.orchestrator.tier1_min_score, 80.0);
        assert_eq!(config.universe.portfolio.len(), 2);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
