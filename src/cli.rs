use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::commands;
use crate::config::AppConfig;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "tvs-tracker")]
#[command(version)]
#[command(about = "Tracks an oracle's Total Value Secured on DefiLlama", long_about = None)]
pub struct Cli {
    /// Run one cycle and exit instead of polling
    #[arg(long)]
    pub once: bool,

    /// Compute everything but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Path to the YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the current watermark state and exit
    #[arg(long)]
    pub status: bool,
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    if cli.status {
        commands::status::run(&config);
        return Ok(());
    }

    commands::run::run(config, cli.once, cli.dry_run).await
}
