use super::ui;
use crate::core::PRICE_UNIT;
use crate::core::quote::Quote;
use crate::core::resolver::PriceResolver;
use crate::core::scheduler::fetch_and_store;
use crate::store::PriceStore;
use anyhow::Result;
use chrono::Local;
use tracing::warn;

/// Resolves one quote, records it and prints it with a short summary.
pub async fn run(resolver: &PriceResolver, store: &PriceStore) -> Result<()> {
    println!("Fetching current gold price...");
    let outcome = fetch_and_store(resolver, store).await;

    for failure in &outcome.failures {
        println!(
            "{}",
            ui::style_text(&format!("Storage error: {failure}"), ui::StyleType::Error)
        );
    }

    let record = &outcome.record;
    if !record.is_valid() {
        anyhow::bail!(
            "Failed to fetch gold price: {}",
            record.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("{}", display_quote(record));

    match store.statistics() {
        Ok(stats) => {
            if let Some(summary) = stats.summary() {
                println!(
                    "\n{} current {:.2}, min {:.2}, max {:.2} {PRICE_UNIT}",
                    ui::style_text("Statistics:", ui::StyleType::TotalLabel),
                    summary.current_price,
                    summary.min_price,
                    summary.max_price
                );
            }
        }
        Err(e) => warn!(error = %e, "Could not compute statistics"),
    }
    Ok(())
}

pub fn display_quote(quote: &Quote) -> String {
    let price = quote
        .price
        .map_or("N/A".to_string(), |p| format!("{p:.2}"));
    let mut output = format!(
        "Current gold price: {} {PRICE_UNIT}\nSource: {}\nTime: {}",
        ui::style_text(&price, ui::StyleType::TotalValue),
        quote.source,
        quote
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    if let (Some(base), Some(markup)) = (quote.base_price, quote.markup_percentage) {
        output.push_str(&format!(
            "\nBase price: {base:.2} {PRICE_UNIT} (+{markup}%)"
        ));
    }
    if let Some(note) = &quote.note {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(&format!("Note: {note}"), ui::StyleType::Subtle)
        ));
    }
    output
}
