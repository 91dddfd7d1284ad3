use crate::core::scheduler::{MAX_INTERVAL, SchedulerSettings};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PageSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub max_candidates: Option<usize>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetalPriceApiConfig {
    #[serde(default = "default_metal_price_api_name")]
    pub name: String,
    #[serde(default = "default_metal_price_api_url")]
    pub base_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AlphaVantageConfig {
    #[serde(default = "default_alpha_vantage_name")]
    pub name: String,
    #[serde(default = "default_alpha_vantage_url")]
    pub base_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_alpha_vantage_symbol")]
    pub symbol: String,
    #[serde(default = "default_usd_cny_rate")]
    pub usd_cny_rate: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FixedSourceConfig {
    #[serde(default = "default_fixed_name")]
    pub name: String,
    #[serde(default = "default_fixed_price")]
    pub price: f64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Page(PageSourceConfig),
    MetalPriceApi(MetalPriceApiConfig),
    AlphaVantage(AlphaVantageConfig),
    Fixed(FixedSourceConfig),
}

/// One trust level. Tiers are tried in the order they are listed.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TierConfig {
    pub name: String,
    #[serde(default)]
    pub markup_percentage: f64,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    pub data_path: Option<String>,
    #[serde(default = "default_ordered_log_cap")]
    pub ordered_log_cap: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            ordered_log_cap: default_ordered_log_cap(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResolverConfig {
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            tick_millis: default_tick_millis(),
            stop_grace_secs: default_stop_grace_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            resolver: ResolverConfig::default(),
            tiers: default_tiers(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or built-in defaults
    /// when no config file has been created yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        debug!("Loading default config");
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "aurum", "aurum")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.storage.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "aurum", "aurum")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver.attempt_timeout_secs)
    }

    /// Scheduler settings, with an optional interval override in minutes.
    pub fn scheduler_settings(&self, interval_minutes: Option<u64>) -> SchedulerSettings {
        let minutes = interval_minutes
            .unwrap_or(self.scheduler.interval_minutes)
            .clamp(1, MAX_INTERVAL.as_secs() / 60);
        SchedulerSettings {
            interval: Duration::from_secs(minutes * 60),
            tick: Duration::from_millis(self.scheduler.tick_millis.max(1)),
            stop_grace: Duration::from_secs(self.scheduler.stop_grace_secs),
        }
    }
}

fn default_ordered_log_cap() -> usize {
    crate::store::DEFAULT_ORDERED_LOG_CAP
}

fn default_attempt_timeout_secs() -> u64 {
    10
}

fn default_interval_minutes() -> u64 {
    1
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_stop_grace_secs() -> u64 {
    5
}

fn default_api_key() -> String {
    "demo".to_string()
}

fn default_currency() -> String {
    "CNY".to_string()
}

fn default_metal_price_api_name() -> String {
    "MetalPriceAPI".to_string()
}

fn default_metal_price_api_url() -> String {
    "https://api.metalpriceapi.com".to_string()
}

fn default_alpha_vantage_name() -> String {
    "Alpha Vantage".to_string()
}

fn default_alpha_vantage_url() -> String {
    "https://www.alphavantage.co".to_string()
}

fn default_alpha_vantage_symbol() -> String {
    "GC=F".to_string()
}

fn default_usd_cny_rate() -> f64 {
    7.2
}

fn default_fixed_name() -> String {
    "Market estimate".to_string()
}

fn default_fixed_price() -> f64 {
    920.0
}

fn page(name: &str, url: &str, selectors: &[&str], keywords: &[&str]) -> PageSourceConfig {
    PageSourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        selectors: selectors.iter().map(|s| s.to_string()).collect(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        max_candidates: None,
        note: None,
    }
}

/// Regional market scrapes first, then bank quotes, then international
/// prices, then a static estimate.
pub fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            name: "regional market".to_string(),
            markup_percentage: 0.0,
            sources: vec![
                SourceConfig::Page(page(
                    "cngold.org",
                    "https://quote.cngold.org/gold/cngold.html",
                    &[],
                    &["水贝"],
                )),
                SourceConfig::Page(page(
                    "gold.org.cn",
                    "https://www.gold.org.cn/",
                    &["div.gold-price", "span.price"],
                    &["水贝"],
                )),
                SourceConfig::Page(PageSourceConfig {
                    max_candidates: Some(5),
                    note: Some("may not be the regional market price, for reference only".to_string()),
                    ..page(
                        "sge.com.cn",
                        "https://www.sge.com.cn/goldPrice",
                        &[],
                        &["黄金", "金价", "Au"],
                    )
                }),
            ],
        },
        TierConfig {
            name: "bank".to_string(),
            markup_percentage: 3.0,
            sources: vec![
                SourceConfig::Page(PageSourceConfig {
                    max_candidates: Some(5),
                    ..page("ICBC", "https://mybank.icbc.com.cn/icbc/newperbank/perbank3/gold/goldaccrual_query_out.jsp", &[], &["黄金"])
                }),
                SourceConfig::Page(PageSourceConfig {
                    max_candidates: Some(5),
                    ..page("Bank of China", "https://www.boc.cn/finadata/gold/", &[], &["黄金"])
                }),
                SourceConfig::Page(PageSourceConfig {
                    max_candidates: Some(5),
                    ..page(
                        "China Construction Bank",
                        "https://www.ccb.com/cn/personal/wealth/gold_silver.html",
                        &[],
                        &["黄金"],
                    )
                }),
            ],
        },
        TierConfig {
            name: "international".to_string(),
            markup_percentage: 8.0,
            sources: vec![
                SourceConfig::AlphaVantage(AlphaVantageConfig {
                    name: default_alpha_vantage_name(),
                    base_url: default_alpha_vantage_url(),
                    api_key: default_api_key(),
                    symbol: default_alpha_vantage_symbol(),
                    usd_cny_rate: default_usd_cny_rate(),
                }),
                SourceConfig::MetalPriceApi(MetalPriceApiConfig {
                    name: default_metal_price_api_name(),
                    base_url: default_metal_price_api_url(),
                    api_key: default_api_key(),
                    currency: default_currency(),
                }),
            ],
        },
        TierConfig {
            name: "static fallback".to_string(),
            markup_percentage: 0.0,
            sources: vec![SourceConfig::Fixed(FixedSourceConfig {
                name: default_fixed_name(),
                price: default_fixed_price(),
                note: Some(
                    "estimate based on recent market conditions, check official channels"
                        .to_string(),
                ),
            })],
        },
    ]
}
