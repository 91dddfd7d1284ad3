use super::ui;
use crate::core::PRICE_UNIT;
use crate::core::quote::{PriceSummary, Quote, Statistics};
use crate::store::PriceStore;
use anyhow::Result;
use chrono::{Local, Utc};
use comfy_table::{Cell, CellAlignment};
use tracing::warn;

const RECENT_RECORDS: usize = 5;

/// Prints statistics for the last `days` days and the most recent records.
pub fn run(store: &PriceStore, days: u32) -> Result<()> {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
    let stats = store.statistics_since(cutoff)?;

    println!(
        "{}\n",
        ui::style_text(
            &format!("Gold price statistics (last {days} days)"),
            ui::StyleType::Title
        )
    );
    println!("{}", display_statistics(&stats));

    let recent = store.recent(RECENT_RECORDS).unwrap_or_else(|e| {
        warn!(error = %e, "Could not read recent records");
        Vec::new()
    });
    if !recent.is_empty() {
        ui::print_separator();
        println!(
            "{}\n",
            ui::style_text("Recent records", ui::StyleType::Title)
        );
        println!("{}", display_recent(&recent));
    }
    Ok(())
}

pub fn display_statistics(stats: &Statistics) -> String {
    let summary = match stats {
        Statistics::Empty {
            total_records,
            message,
            ..
        } => {
            return format!(
                "{} ({total_records} records in period)",
                ui::style_text(message, ui::StyleType::Error)
            );
        }
        Statistics::Summary(summary) => summary,
    };

    let mut output = summary_table(summary);
    if !summary.data_sources.is_empty() {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Source"), ui::header_cell("Records")]);
        for (source, count) in &summary.data_sources {
            table.add_row(vec![
                Cell::new(source),
                Cell::new(count).set_alignment(CellAlignment::Right),
            ]);
        }
        output.push_str(&format!("\n\nBy source:\n{table}"));
    }
    output
}

fn summary_table(summary: &PriceSummary) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Metric"),
        ui::header_cell(&format!("Value ({PRICE_UNIT})")),
    ]);

    table.add_row(vec![
        Cell::new("Current price"),
        ui::price_cell(summary.current_price),
    ]);
    table.add_row(vec![Cell::new("Lowest price"), ui::price_cell(summary.min_price)]);
    table.add_row(vec![Cell::new("Highest price"), ui::price_cell(summary.max_price)]);
    table.add_row(vec![Cell::new("Average price"), ui::price_cell(summary.avg_price)]);
    table.add_row(vec![Cell::new("Std deviation"), ui::price_cell(summary.price_std)]);
    table.add_row(vec![
        Cell::new("Records"),
        Cell::new(format!(
            "{} ({} valid)",
            summary.total_records, summary.valid_price_records
        ))
        .set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Last update"),
        Cell::new(summary.latest_update.map_or("N/A".to_string(), |ts| {
            ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
        }))
        .set_alignment(CellAlignment::Right),
    ]);

    table.to_string()
}

pub fn display_recent(records: &[Quote]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Time"),
        ui::header_cell("Source"),
        ui::header_cell(&format!("Price ({PRICE_UNIT})")),
        ui::header_cell("Status"),
    ]);

    for record in records.iter().rev() {
        table.add_row(vec![
            Cell::new(
                record
                    .timestamp
                    .with_timezone(&Local)
                    .format("%m-%d %H:%M:%S"),
            ),
            Cell::new(&record.source),
            ui::format_optional_cell(record.price, |p| format!("{p:.2}")),
            ui::outcome_cell(record.error.as_deref()),
        ]);
    }
    table.to_string()
}
