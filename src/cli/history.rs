use crate::store::PriceStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;

pub fn default_export_file_name(now: DateTime<Local>) -> String {
    format!("gold_prices_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Exports the tabular log as a spreadsheet-friendly CSV.
pub fn export(store: &PriceStore, file: Option<PathBuf>) -> Result<PathBuf> {
    let destination = file.unwrap_or_else(|| PathBuf::from(default_export_file_name(Local::now())));
    let rows = store
        .export(&destination)
        .context("Failed to export price history")?;
    println!("Exported {rows} records to {}", destination.display());
    Ok(destination)
}

pub fn clear(store: &PriceStore) -> Result<()> {
    println!("Clearing all price history...");
    store.clear().context("Failed to clear price history")?;
    println!("All price history cleared");
    Ok(())
}

/// Drops records older than `days` days.
pub fn prune(store: &PriceStore, days: u32) -> Result<usize> {
    let removed = store
        .prune(chrono::Duration::days(i64::from(days)))
        .context("Failed to prune price history")?;
    println!("Removed {removed} records older than {days} days");
    Ok(removed)
}
