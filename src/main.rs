use clap::Parser;
use tickmux::cli::{Cli, Commands};
use tickmux::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("Could not load config from {}: {}", cli.config, e))?;

    tickmux::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("starting ingestion pipeline");
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Push feed: {} (capacity {})", config.push.url, config.push.capacity);
            println!("  Pull feed: {}", config.poll.base_url);
            println!(
                "  Tiers: fast {}s / medium {}s / slow {}s",
                config.poll.fast.interval_secs,
                config.poll.medium.interval_secs,
                config.poll.slow.interval_secs
            );
            println!("  Cache TTL: {}s", config.cache.ttl_secs);
        }
    }

    Ok(())
}
