//! International spot price APIs. Both quote per troy ounce and are
//! converted to yuan per gram here.

use crate::core::config::{AlphaVantageConfig, MetalPriceApiConfig};
use crate::core::quote::RawQuote;
use crate::core::source::{AdapterError, SourceAdapter};
use crate::providers::util::{get_text, per_gram};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub struct MetalPriceApiAdapter {
    name: String,
    base_url: String,
    api_key: String,
    currency: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct MetalPriceResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

impl MetalPriceApiAdapter {
    pub fn new(config: &MetalPriceApiConfig, client: Client) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            currency: config.currency.clone(),
            client,
        }
    }
}

#[async_trait]
impl SourceAdapter for MetalPriceApiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    #[instrument(name = "MetalPriceApiFetch", skip(self), fields(source = %self.name))]
    async fn attempt(&self) -> Result<RawQuote, AdapterError> {
        let url = format!(
            "{}/v1/latest?api_key={}&base=XAU&currencies={}",
            self.base_url, self.api_key, self.currency
        );
        let text = get_text(&self.client, &url).await?;
        let raw_data: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AdapterError::Parse(e.to_string()))?;
        let data: MetalPriceResponse = serde_json::from_value(raw_data.clone())
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        let per_ounce = data
            .rates
            .get(&self.currency)
            .copied()
            .ok_or(AdapterError::Empty)?;
        let price = per_gram(per_ounce);
        debug!(per_ounce, price, "Converted metal price");

        Ok(RawQuote::new(&self.name, price)
            .with_raw_data(raw_data)
            .with_note("international gold price"))
    }
}

pub struct AlphaVantageAdapter {
    name: String,
    base_url: String,
    api_key: String,
    symbol: String,
    usd_cny_rate: f64,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}

impl AlphaVantageAdapter {
    pub fn new(config: &AlphaVantageConfig, client: Client) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            symbol: config.symbol.clone(),
            usd_cny_rate: config.usd_cny_rate,
            client,
        }
    }
}

#[async_trait]
impl SourceAdapter for AlphaVantageAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    #[instrument(name = "AlphaVantageFetch", skip(self), fields(source = %self.name))]
    async fn attempt(&self) -> Result<RawQuote, AdapterError> {
        let url = format!(
            "{}/query?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.base_url, self.symbol, self.api_key
        );
        let text = get_text(&self.client, &url).await?;
        let raw_data: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AdapterError::Parse(e.to_string()))?;
        let data: GlobalQuoteResponse = serde_json::from_value(raw_data.clone())
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        let usd_per_ounce = data
            .global_quote
            .and_then(|q| q.price)
            .ok_or(AdapterError::Empty)?
            .trim()
            .parse::<f64>()
            .map_err(|e| AdapterError::Parse(e.to_string()))?;
        let price = per_gram(usd_per_ounce * self.usd_cny_rate);
        debug!(usd_per_ounce, price, "Converted futures price");

        Ok(RawQuote::new(&self.name, price)
            .with_raw_data(raw_data)
            .with_note("international gold futures price"))
    }
}
