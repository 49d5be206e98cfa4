//! Sentinel CLI entry point.

use anyhow::Result;
use clap::Parser;

use sentinel::cli::{Cli, Commands};
use sentinel::domain::models::Config;
use sentinel::infrastructure::config::ConfigLoader;
use sentinel::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => sentinel::cli::handle_error(err, cli.json),
    };

    // keeps the file writer flushing until exit
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => sentinel::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Validate(args) => sentinel::cli::commands::validate::execute(args, cli.json).await,
        Commands::Route(args) => sentinel::cli::commands::route::execute(args, cli.json).await,
        Commands::Breakers(args) => {
            sentinel::cli::commands::breakers::execute(args, &config, cli.json).await
        }
    };

    if let Err(err) = result {
        sentinel::cli::handle_error(err, cli.json);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    Ok(config)
}
