//! CLI interface for tickmux
//!
//! Provides subcommands for:
//! - `run`: Start the ingestion pipeline
//! - `config`: Show the effective configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tickmux")]
#[command(about = "Multi-source real-time equity price ingestion")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ingestion pipeline
    Run(RunArgs),
    /// Show the effective configuration
    Config,
}
