pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::resolver::PriceResolver;
use crate::store::PriceStore;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Single,
    Schedule { interval_minutes: Option<u64> },
    Stats { days: u32 },
    Test,
    Export { file: Option<PathBuf> },
    Clear,
    Prune { days: u32 },
}

pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    match config_path {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<PriceStore>> {
    let data_path = config.data_path()?;
    let store = PriceStore::open(&data_path, config.storage.ordered_log_cap)
        .with_context(|| format!("Failed to open price store at {}", data_path.display()))?;
    Ok(Arc::new(store))
}

fn build_resolver(config: &AppConfig) -> Result<Arc<PriceResolver>> {
    let client = providers::util::http_client().context("Failed to build HTTP client")?;
    let tiers = providers::build_tiers(&config.tiers, &client);
    Ok(Arc::new(PriceResolver::new(tiers, config.attempt_timeout())))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Gold price monitor starting...");

    let config = load_config(config_path)?;
    debug!("Loaded config: {config:#?}");
    let store = open_store(&config)?;

    match command {
        AppCommand::Single => {
            let resolver = build_resolver(&config)?;
            cli::single::run(&resolver, &store).await
        }
        AppCommand::Schedule { interval_minutes } => {
            let resolver = build_resolver(&config)?;
            let settings = config.scheduler_settings(interval_minutes);
            cli::schedule::run(resolver, store, settings).await
        }
        AppCommand::Stats { days } => cli::stats::run(&store, days),
        AppCommand::Test => {
            let resolver = build_resolver(&config)?;
            cli::probe::run(&resolver).await
        }
        AppCommand::Export { file } => cli::history::export(&store, file).map(|_| ()),
        AppCommand::Clear => cli::history::clear(&store),
        AppCommand::Prune { days } => cli::history::prune(&store, days).map(|_| ()),
    }
}
