use std::process::ExitCode;

use clap::Parser;
use harvester_core::config::HarvesterConfig;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "harvester=info,harvester_scheduler=info,harvester_params=info,harvester_http=info"
                    .into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // explicit --config > HARVESTER_CONFIG env > ~/.harvester/harvester.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("HARVESTER_CONFIG").ok());
    let config = HarvesterConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        HarvesterConfig::default()
    });

    match cli.command {
        Commands::ValidateCron { expression } => Ok(if commands::validate_cron(&expression) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }),
        Commands::Expand { job_file } => commands::expand(&config, &job_file).await,
        Commands::Run { job_file, no_log } => commands::run(&config, &job_file, no_log).await,
        Commands::Logs { job, limit } => commands::logs(&config, job.as_deref(), limit),
        Commands::Stats { since } => commands::stats(&config, since.as_deref()),
    }
}
