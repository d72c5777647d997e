//! Run command implementation

use crate::auth::StaticToken;
use crate::backup::BackupConfig;
use crate::cache::PriceCache;
use crate::config::Config;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::poll::{QuoteClient, QuoteClientConfig, TierSettings};
use crate::push::{PushConfig, SocketConfig};
use crate::sink::LoggingSink;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the upstream session credential
const CREDENTIAL_ENV: &str = "TICKMUX_CREDENTIAL";

#[derive(Args, Debug)]
pub struct RunArgs {}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let credential = std::env::var(CREDENTIAL_ENV)
            .map_err(|_| anyhow::anyhow!("{CREDENTIAL_ENV} is not set"))?;
        let tokens = Arc::new(StaticToken::new(credential));

        let cache = Arc::new(PriceCache::new(chrono::Duration::seconds(
            config.cache.ttl_secs as i64,
        )));

        let pull = Arc::new(QuoteClient::new(
            quote_config(&config.poll.base_url, config.poll.timeout_secs),
            tokens.clone(),
        )?);
        let backup_url = if config.backup.base_url.is_empty() {
            &config.poll.base_url
        } else {
            &config.backup.base_url
        };
        let backup = Arc::new(QuoteClient::with_source(
            quote_config(backup_url, config.poll.timeout_secs),
            tokens.clone(),
            crate::feed::Source::Backup,
        )?);

        let orchestrator = Arc::new(Orchestrator::new(
            orchestrator_config(&config),
            push_config(&config),
            tier_settings(&config),
            backup_config(&config),
            cache,
            pull,
            backup,
            tokens,
            Arc::new(LoggingSink),
        ));

        for code in &config.universe.portfolio {
            orchestrator.add_portfolio_symbol(code);
        }
        for code in &config.universe.watching {
            orchestrator.add_watching_symbol(code);
        }
        orchestrator
            .backup()
            .set_symbols(config.universe.backup.clone());

        Arc::clone(&orchestrator).start();
        tracing::info!(
            tracked = orchestrator.tracked_count(),
            "tickmux running, press ctrl-c to stop"
        );

        tokio::signal::ctrl_c().await?;
        orchestrator.stop().await;
        Ok(())
    }
}

fn quote_config(base_url: &str, timeout_secs: u64) -> QuoteClientConfig {
    let mut config = QuoteClientConfig::new(base_url);
    config.timeout = Duration::from_secs(timeout_secs);
    config
}

fn push_config(config: &Config) -> PushConfig {
    PushConfig {
        socket: SocketConfig {
            url: config.push.url.clone(),
            max_connect_attempts: config.push.max_connect_attempts,
            initial_reconnect_delay: Duration::from_millis(config.push.initial_reconnect_delay_ms),
            max_reconnect_delay: Duration::from_secs(config.push.max_reconnect_delay_secs),
            ping_interval: config.push.ping_interval(),
            pong_timeout: config.push.pong_timeout(),
        },
        capacity: config.push.capacity,
        quote_tr_id: config.push.quote_tr_id.clone(),
        rebalance_interval: Duration::from_secs(config.push.rebalance_interval_secs),
    }
}

fn tier_settings(config: &Config) -> [TierSettings; 3] {
    [&config.poll.fast, &config.poll.medium, &config.poll.slow].map(|tier| TierSettings {
        interval: Duration::from_secs(tier.interval_secs),
        burst: tier.burst,
        requests_per_sec: tier.requests_per_sec,
    })
}

fn backup_config(config: &Config) -> BackupConfig {
    BackupConfig {
        interval: Duration::from_secs(config.backup.interval_secs),
        burst: config.backup.burst,
        requests_per_sec: config.backup.requests_per_sec,
    }
}

fn orchestrator_config(config: &Config) -> OrchestratorConfig {
    OrchestratorConfig {
        rebalance_interval: Duration::from_secs(config.orchestrator.rebalance_interval_secs),
        sync_interval: Duration::from_secs(config.orchestrator.sync_interval_secs),
        tier1_min_score: config.orchestrator.tier1_min_score,
        tier2_min_score: config.orchestrator.tier2_min_score,
    }
}
