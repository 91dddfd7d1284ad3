use aurum::cli::ui;
use aurum::core::log::init_logging;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for aurum::AppCommand {
    fn from(cmd: Commands) -> aurum::AppCommand {
        match cmd {
            Commands::Single => aurum::AppCommand::Single,
            Commands::Schedule { interval } => aurum::AppCommand::Schedule {
                interval_minutes: interval,
            },
            Commands::Stats { days } => aurum::AppCommand::Stats { days },
            Commands::Test => aurum::AppCommand::Test,
            Commands::Export { file } => aurum::AppCommand::Export { file },
            Commands::Clear => aurum::AppCommand::Clear,
            Commands::Prune { days } => aurum::AppCommand::Prune { days },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch the current gold price once and record it
    Single,
    /// Fetch and record the gold price periodically until Ctrl+C
    Schedule {
        /// Minutes between fetches
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Display price statistics and recent records
    Stats {
        /// Only consider the last N days
        #[arg(short, long, default_value_t = 7)]
        days: u32,
    },
    /// Check every price source without recording anything
    Test,
    /// Export the price history to a CSV spreadsheet
    Export {
        /// Destination file, defaults to gold_prices_<timestamp>.csv
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Delete all recorded prices
    Clear,
    /// Delete records older than N days
    Prune {
        #[arg(short, long)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => aurum::cli::setup::setup(),
        Some(cmd @ Commands::Schedule { .. }) => {
            aurum::run_command(cmd.into(), cli.config_path.as_deref()).await
        }
        Some(cmd) => {
            tokio::select! {
                result = aurum::run_command(cmd.into(), cli.config_path.as_deref()) => result,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nInterrupted by user");
                    Ok(())
                }
            }
        }
        None => Cli::command().print_help().map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Application failed");
            eprintln!(
                "{}",
                ui::style_text(&format!("Error: {e:#}"), ui::StyleType::Error)
            );
            eprintln!("Hint: check your network connection and whether the price sources are reachable");
            ExitCode::FAILURE
        }
    }
}
