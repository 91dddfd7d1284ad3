use super::ui;
use crate::core::resolver::PriceResolver;
use crate::core::scheduler::{Scheduler, SchedulerSettings, SchedulerStatus};
use crate::store::PriceStore;
use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;

/// Runs the scheduler until Ctrl+C, then stops it.
pub async fn run(
    resolver: Arc<PriceResolver>,
    store: Arc<PriceStore>,
    settings: SchedulerSettings,
) -> Result<()> {
    println!(
        "Starting scheduled monitoring, fetching every {} minute(s)",
        settings.interval.as_secs() / 60
    );

    let scheduler = Scheduler::new(resolver, store, settings);
    scheduler.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\nStopping monitor...");
    scheduler.stop().await;
    println!("{}", display_status(&scheduler.status()));
    Ok(())
}

pub fn display_status(status: &SchedulerStatus) -> String {
    let state = if status.is_running {
        ui::style_text("running", ui::StyleType::Success)
    } else {
        ui::style_text("stopped", ui::StyleType::Subtle)
    };
    let next_run = status.next_scheduled_run.map_or("-".to_string(), |ts| {
        ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
    });
    format!(
        "Scheduler {state}: every {}s, next run {next_run}, {} pending, {} completed",
        status.interval.as_secs(),
        status.pending_job_count,
        status.completed_cycles
    )
}
