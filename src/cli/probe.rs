use super::ui;
use crate::core::resolver::{PriceResolver, ProbeReport};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

/// Tries every configured source once and prints the outcome. Nothing is
/// persisted.
pub async fn run(resolver: &PriceResolver) -> Result<()> {
    let pb = ui::new_spinner("Testing price sources...");
    let reports = resolver.probe().await;
    pb.finish_and_clear();

    if reports.is_empty() {
        println!("No price sources configured.");
        return Ok(());
    }

    println!("{}", display_reports(&reports));
    let answered = reports.iter().filter(|r| r.result.is_ok()).count();
    let summary = format!("{answered}/{} sources answered", reports.len());
    let style = if answered == 0 {
        ui::StyleType::Error
    } else {
        ui::StyleType::TotalValue
    };
    println!("\n{}", ui::style_text(&summary, style));
    Ok(())
}

pub fn display_reports(reports: &[ProbeReport]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Tier"),
        ui::header_cell("Source"),
        ui::header_cell("Endpoint"),
        ui::header_cell("Raw price"),
        ui::header_cell("Time (ms)"),
        ui::header_cell("Result"),
    ]);

    for report in reports {
        let error = report.result.as_ref().err().map(ToString::to_string);
        table.add_row(vec![
            Cell::new(&report.tier),
            Cell::new(&report.source),
            Cell::new(report.endpoint.as_deref().unwrap_or("-")),
            ui::format_optional_cell(report.result.as_ref().ok(), |raw| {
                format!("{:.2}", raw.price)
            }),
            Cell::new(report.elapsed.as_millis()).set_alignment(CellAlignment::Right),
            ui::outcome_cell(error.as_deref()),
        ]);
    }
    table.to_string()
}
