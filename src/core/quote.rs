//! Quote records and the raw readings they are derived from

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source label used when every tier has been exhausted.
pub const ALL_SOURCES: &str = "all sources";
/// Error text attached to the terminal quote when nothing answered.
pub const NO_SOURCE_AVAILABLE: &str = "no source available";
/// All prices are quoted in yuan per gram.
pub const PRICE_UNIT: &str = "CNY/g";

/// A price reading as returned by a single source adapter, before any markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    pub source: String,
    pub price: f64,
    pub raw_text: Option<String>,
    pub raw_data: Option<serde_json::Value>,
    pub note: Option<String>,
}

impl RawQuote {
    pub fn new(source: impl Into<String>, price: f64) -> Self {
        Self {
            source: source.into(),
            price,
            raw_text: None,
            raw_data: None,
            note: None,
        }
    }

    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = Some(text.into());
        self
    }

    pub fn with_raw_data(mut self, data: serde_json::Value) -> Self {
        self.raw_data = Some(data);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// One resolved (or failed) price observation, in currency units per gram.
///
/// Exactly one of `price` and `error` is set. Quotes are built through
/// [`Quote::priced`] or [`Quote::failed`] to keep it that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub source: String,
    pub price: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Builds a successful quote from a raw reading, passed through unchanged.
    pub fn priced(raw: RawQuote, timestamp: DateTime<Utc>) -> Self {
        Self {
            source: raw.source,
            price: Some(round_cents(raw.price)),
            timestamp,
            raw_text: raw.raw_text,
            raw_data: raw.raw_data,
            base_price: None,
            markup_percentage: None,
            error: None,
            note: raw.note,
            saved_at: None,
        }
    }

    /// Builds a terminal failure quote.
    pub fn failed(
        source: impl Into<String>,
        error: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            price: None,
            timestamp,
            raw_text: None,
            raw_data: None,
            base_price: None,
            markup_percentage: None,
            error: Some(error.into()),
            note: None,
            saved_at: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.price.is_some()
    }
}

/// Rounds a price to two decimal places.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Applies a percentage markup to a base price, rounded to two decimals.
pub fn apply_markup(base_price: f64, markup_percentage: f64) -> f64 {
    round_cents(base_price * (1.0 + markup_percentage / 100.0))
}

/// Aggregate figures over the valid rows of the tabular log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub total_records: usize,
    pub valid_price_records: usize,
    pub current_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    /// Population standard deviation.
    pub price_std: f64,
    pub data_sources: BTreeMap<String, usize>,
    pub latest_update: Option<DateTime<Utc>>,
}

/// Statistics recomputed from the tabular log on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Statistics {
    Empty {
        total_records: usize,
        valid_price_records: usize,
        message: String,
    },
    Summary(PriceSummary),
}

impl Statistics {
    pub fn total_records(&self) -> usize {
        match self {
            Statistics::Empty { total_records, .. } => *total_records,
            Statistics::Summary(summary) => summary.total_records,
        }
    }

    pub fn valid_price_records(&self) -> usize {
        match self {
            Statistics::Empty {
                valid_price_records,
                ..
            } => *valid_price_records,
            Statistics::Summary(summary) => summary.valid_price_records,
        }
    }

    pub fn summary(&self) -> Option<&PriceSummary> {
        match self {
            Statistics::Summary(summary) => Some(summary),
            Statistics::Empty { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_markup_rounds_to_cents() {
        assert_eq!(apply_markup(900.0, 8.0), 972.0);
        assert_eq!(apply_markup(915.5, 3.0), 942.97);
        assert_eq!(apply_markup(920.0, 0.0), 920.0);
        assert_eq!(apply_markup(123.456, 0.0), 123.46);
    }

    #[test]
    fn test_failed_quote_has_error_and_no_price() {
        let quote = Quote::failed(ALL_SOURCES, NO_SOURCE_AVAILABLE, Utc::now());
        assert!(!quote.is_valid());
        assert_eq!(quote.error.as_deref(), Some(NO_SOURCE_AVAILABLE));
    }

    #[test]
    fn test_quote_json_skips_empty_fields() {
        let raw = RawQuote::new("Test Source", 480.5).with_raw_text("480.5元/克");
        let quote = Quote::priced(raw, Utc::now());

        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["price"], 480.5);
        assert_eq!(json["raw_text"], "480.5元/克");
        assert!(json.get("error").is_none());
        assert!(json.get("saved_at").is_none());

        let back: Quote = serde_json::from_value(json).unwrap();
        assert_eq!(back, quote);
    }

    #[test]
    fn test_empty_statistics_serializes_without_price_fields() {
        let stats = Statistics::Empty {
            total_records: 2,
            valid_price_records: 0,
            message: "no valid data".to_string(),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_records"], 2);
        assert!(json.get("min_price").is_none());
        assert!(stats.summary().is_none());
    }
}
