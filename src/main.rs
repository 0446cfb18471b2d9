//! setup-vapoursynth
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use setup_vapoursynth::cli::{Cli, Commands};
use setup_vapoursynth::config::ConfigManager;
use setup_vapoursynth::error::ProvisionResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            if let Some(output) = e.command_output() {
                eprintln!("{}", style(output).dim());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ProvisionResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("setup_vapoursynth=warn"),
        1 => EnvFilter::new("setup_vapoursynth=info"),
        _ => EnvFilter::new("setup_vapoursynth=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time();
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Install(args) => setup_vapoursynth::cli::commands::install(args, &config).await,
        Commands::Versions(args) => {
            setup_vapoursynth::cli::commands::versions(args, &config).await
        }
        Commands::Cache(args) => setup_vapoursynth::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            setup_vapoursynth::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
