//! Statistics over tabular log rows.

use super::tabular::TabularRow;
use crate::core::quote::{PriceSummary, Statistics};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub const NO_VALID_DATA: &str = "no valid data";

/// Computes statistics over `rows`, in log order. Rows without a numeric
/// price only count towards `total_records`.
pub fn compute(rows: &[TabularRow]) -> Statistics {
    let valid: Vec<(&TabularRow, f64)> = rows
        .iter()
        .filter_map(|row| row.price.filter(|p| p.is_finite()).map(|p| (row, p)))
        .collect();

    let Some((latest, current_price)) = valid.last().copied() else {
        return Statistics::Empty {
            total_records: rows.len(),
            valid_price_records: 0,
            message: NO_VALID_DATA.to_string(),
        };
    };

    let count = valid.len() as f64;
    let prices = valid.iter().map(|(_, p)| *p);
    let min_price = prices.clone().fold(f64::INFINITY, f64::min);
    let max_price = prices.clone().fold(f64::NEG_INFINITY, f64::max);
    let avg_price = prices.clone().sum::<f64>() / count;
    let variance = prices.map(|p| (p - avg_price).powi(2)).sum::<f64>() / count;

    let mut data_sources = BTreeMap::new();
    for (row, _) in &valid {
        *data_sources.entry(row.source.clone()).or_insert(0) += 1;
    }

    Statistics::Summary(PriceSummary {
        total_records: rows.len(),
        valid_price_records: valid.len(),
        current_price,
        min_price,
        max_price,
        avg_price,
        price_std: variance.sqrt(),
        data_sources,
        latest_update: latest.parsed_timestamp(),
    })
}

/// Like [`compute`], restricted to rows stamped at or after `cutoff`.
pub fn compute_since(rows: &[TabularRow], cutoff: DateTime<Utc>) -> Statistics {
    let recent: Vec<TabularRow> = rows
        .iter()
        .filter(|row| row.parsed_timestamp().is_some_and(|ts| ts >= cutoff))
        .cloned()
        .collect();
    compute(&recent)
}
