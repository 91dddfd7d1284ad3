pub mod fixed;
pub mod metal_api;
pub mod page;
pub mod util;

use crate::core::config::{SourceConfig, TierConfig};
use crate::core::resolver::Tier;
use crate::core::source::SourceAdapter;
use fixed::FixedAdapter;
use metal_api::{AlphaVantageAdapter, MetalPriceApiAdapter};
use page::PageAdapter;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// Builds the adapter described by one source entry.
pub fn build_adapter(config: &SourceConfig, client: &Client) -> Arc<dyn SourceAdapter> {
    match config {
        SourceConfig::Page(c) => Arc::new(PageAdapter::new(c, client.clone())),
        SourceConfig::MetalPriceApi(c) => Arc::new(MetalPriceApiAdapter::new(c, client.clone())),
        SourceConfig::AlphaVantage(c) => Arc::new(AlphaVantageAdapter::new(c, client.clone())),
        SourceConfig::Fixed(c) => Arc::new(FixedAdapter::new(c)),
    }
}

/// Builds resolver tiers in configured order, sharing one HTTP client.
pub fn build_tiers(configs: &[TierConfig], client: &Client) -> Vec<Tier> {
    configs
        .iter()
        .map(|tier_config| {
            let tier = tier_config.sources.iter().fold(
                Tier::new(&tier_config.name, tier_config.markup_percentage),
                |tier, source| tier.with_adapter(build_adapter(source, client)),
            );
            debug!(
                tier = %tier.name,
                adapters = tier.adapters.len(),
                "Built tier"
            );
            tier
        })
        .collect()
}
