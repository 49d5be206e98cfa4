//! Command-line interface: argument types, shared input and output helpers,
//! and one module per top-level command.

pub mod commands;
pub mod display;
pub mod input;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{breakers::BreakersArgs, route::RouteArgs, validate::ValidateArgs};

#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(about = "Sentinel - circuit breakers and planning-graph validation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file to load instead of .sentinel/config.yaml
    #[arg(short, long, global = true, env = "SENTINEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate data flow and structure documents
    Validate(ValidateArgs),
    /// Decide which producer must correct a list of validation errors
    Route(RouteArgs),
    /// Inspect and control persisted circuit breakers
    Breakers(BreakersArgs),
}

/// A command finished and already reported its outcome, but the process
/// should still exit with a non-zero status.
#[derive(Debug, thiserror::Error)]
#[error("command reported failure (exit code {0})")]
pub struct ReportedFailure(pub i32);

/// Print a command error and exit.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if let Some(ReportedFailure(code)) = err.downcast_ref::<ReportedFailure>() {
        std::process::exit(*code);
    }

    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{}", display::action_failure(&format!("{err:#}")));
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_json_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["sentinel", "route", "errors.json", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Route(_)));
    }
}
