//! Tiered fallback over source adapters.
//!
//! Tiers are consulted in order and adapters within a tier in listed order.
//! The first adapter that produces a usable price wins, its tier's markup is
//! applied, and nothing after it is invoked. Adapters are never run in
//! parallel and never retried within one resolution.

use crate::core::quote::{ALL_SOURCES, NO_SOURCE_AVAILABLE, Quote, RawQuote, apply_markup};
use crate::core::source::{AdapterError, SourceAdapter, ensure_usable};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// An ordered group of adapters sharing one markup policy.
#[derive(Clone)]
pub struct Tier {
    pub name: String,
    pub markup_percentage: f64,
    pub adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl Tier {
    pub fn new(name: impl Into<String>, markup_percentage: f64) -> Self {
        Self {
            name: name.into(),
            markup_percentage,
            adapters: Vec::new(),
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Turns a base reading into the estimated target-market quote. Any
    /// non-zero markup is applied; only a positive one marks the source as
    /// estimated.
    pub fn derive(&self, raw: RawQuote, timestamp: DateTime<Utc>) -> Quote {
        if self.markup_percentage == 0.0 {
            return Quote::priced(raw, timestamp);
        }

        let base_price = raw.price;
        let mut quote = Quote::priced(raw, timestamp);
        if self.markup_percentage > 0.0 {
            quote.source = format!("{} (estimated)", quote.source);
        }
        quote.price = Some(apply_markup(base_price, self.markup_percentage));
        quote.base_price = Some(base_price);
        quote.markup_percentage = Some(self.markup_percentage);
        quote.note = Some(format!(
            "estimated from {} price, actual market price may differ",
            self.name
        ));
        quote
    }
}

/// Outcome of probing a single adapter, used for connectivity checks.
#[derive(Debug)]
pub struct ProbeReport {
    pub tier: String,
    pub source: String,
    pub endpoint: Option<String>,
    pub elapsed: Duration,
    pub result: Result<RawQuote, AdapterError>,
}

pub struct PriceResolver {
    tiers: Vec<Tier>,
    attempt_timeout: Duration,
}

impl PriceResolver {
    pub fn new(tiers: Vec<Tier>, attempt_timeout: Duration) -> Self {
        Self {
            tiers,
            attempt_timeout,
        }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Produces a quote from the first tier that answers. Never fails: when
    /// every adapter is exhausted the returned quote carries the error.
    pub async fn resolve(&self) -> Quote {
        debug!(tiers = self.tiers.len(), "Resolving gold price");

        for tier in &self.tiers {
            for adapter in &tier.adapters {
                match self.attempt(adapter.as_ref()).await {
                    Ok(raw) => {
                        let quote = tier.derive(raw, Utc::now());
                        info!(
                            tier = %tier.name,
                            source = %quote.source,
                            price = ?quote.price,
                            "Resolved gold price"
                        );
                        return quote;
                    }
                    Err(e) => {
                        warn!(
                            tier = %tier.name,
                            source = %adapter.name(),
                            error = %e,
                            "Source adapter failed, trying next"
                        );
                    }
                }
            }
        }

        error!("All price sources exhausted");
        Quote::failed(ALL_SOURCES, NO_SOURCE_AVAILABLE, Utc::now())
    }

    /// Attempts every adapter once without stopping at the first success.
    pub async fn probe(&self) -> Vec<ProbeReport> {
        let mut reports = Vec::new();
        for tier in &self.tiers {
            for adapter in &tier.adapters {
                let started = Instant::now();
                let result = self.attempt(adapter.as_ref()).await;
                reports.push(ProbeReport {
                    tier: tier.name.clone(),
                    source: adapter.name().to_string(),
                    endpoint: adapter.endpoint().map(str::to_string),
                    elapsed: started.elapsed(),
                    result,
                });
            }
        }
        reports
    }

    async fn attempt(&self, adapter: &dyn SourceAdapter) -> Result<RawQuote, AdapterError> {
        debug!(source = %adapter.name(), "Attempting source");
        let call = AssertUnwindSafe(adapter.attempt()).catch_unwind();
        match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(Ok(result)) => result.and_then(ensure_usable),
            Ok(Err(_)) => Err(AdapterError::Panicked),
            Err(_) => Err(AdapterError::Timeout(self.attempt_timeout)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) enum Behaviour {
        Price(f64),
        Fail,
        Hang,
        Panic,
    }

    pub(crate) struct MockAdapter {
        name: String,
        behaviour: Behaviour,
        pub(crate) calls: AtomicUsize,
    }

    impl MockAdapter {
        pub(crate) fn new(name: &str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceAdapter for MockAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn attempt(&self) -> Result<RawQuote, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Price(price) => Ok(RawQuote::new(&self.name, price)),
                Behaviour::Fail => Err(AdapterError::Status(503)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(AdapterError::Empty)
                }
                Behaviour::Panic => panic!("adapter blew up"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_through_to_next_tier_with_markup() {
        let a = MockAdapter::new("Bank A", Behaviour::Hang);
        let b = MockAdapter::new("Metal API", Behaviour::Price(900.0));
        let resolver = PriceResolver::new(
            vec![
                Tier::new("bank", 3.0).with_adapter(a.clone()),
                Tier::new("international", 8.0).with_adapter(b.clone()),
            ],
            DEFAULT_ATTEMPT_TIMEOUT,
        );

        let quote = resolver.resolve().await;

        assert_eq!(quote.price, Some(972.0));
        assert_eq!(quote.source, "Metal API (estimated)");
        assert_eq!(quote.base_price, Some(900.0));
        assert_eq!(quote.markup_percentage, Some(8.0));
        assert!(quote.error.is_none());
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let first = MockAdapter::new("first", Behaviour::Fail);
        let second = MockAdapter::new("second", Behaviour::Price(915.5));
        let third = MockAdapter::new("third", Behaviour::Price(1.0));
        let later_tier = MockAdapter::new("later", Behaviour::Price(2.0));
        let resolver = PriceResolver::new(
            vec![
                Tier::new("bank", 3.0)
                    .with_adapter(first.clone())
                    .with_adapter(second.clone())
                    .with_adapter(third.clone()),
                Tier::new("static fallback", 0.0).with_adapter(later_tier.clone()),
            ],
            DEFAULT_ATTEMPT_TIMEOUT,
        );

        let quote = resolver.resolve().await;

        assert_eq!(quote.price, Some(942.97));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
        assert_eq!(later_tier.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_markup_passes_source_through() {
        let direct = MockAdapter::new("Regional Market", Behaviour::Price(930.456));
        let resolver = PriceResolver::new(
            vec![Tier::new("regional market", 0.0).with_adapter(direct)],
            DEFAULT_ATTEMPT_TIMEOUT,
        );

        let quote = resolver.resolve().await;

        assert_eq!(quote.source, "Regional Market");
        assert_eq!(quote.price, Some(930.46));
        assert!(quote.base_price.is_none());
        assert!(quote.markup_percentage.is_none());
    }

    #[test]
    fn test_negative_markup_is_applied_without_estimate_suffix() {
        let tier = Tier::new("discount", -5.0);
        let quote = tier.derive(RawQuote::new("Dealer", 100.0), Utc::now());

        assert_eq!(quote.price, Some(95.0));
        assert_eq!(quote.source, "Dealer");
        assert_eq!(quote.base_price, Some(100.0));
        assert_eq!(quote.markup_percentage, Some(-5.0));
    }

    #[tokio::test]
    async fn test_all_sources_exhausted_returns_error_quote() {
        let resolver = PriceResolver::new(
            vec![
                Tier::new("bank", 3.0).with_adapter(MockAdapter::new("a", Behaviour::Fail)),
                Tier::new("international", 8.0)
                    .with_adapter(MockAdapter::new("b", Behaviour::Price(0.0)))
                    .with_adapter(MockAdapter::new("c", Behaviour::Panic)),
            ],
            DEFAULT_ATTEMPT_TIMEOUT,
        );

        let quote = resolver.resolve().await;

        assert!(quote.price.is_none());
        assert_eq!(quote.source, ALL_SOURCES);
        assert_eq!(quote.error.as_deref(), Some(NO_SOURCE_AVAILABLE));
    }

    #[tokio::test]
    async fn test_empty_resolver_returns_error_quote() {
        let resolver = PriceResolver::new(Vec::new(), DEFAULT_ATTEMPT_TIMEOUT);
        let quote = resolver.resolve().await;
        assert!(!quote.is_valid());
        assert!(!quote.error.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_probe_attempts_every_adapter() {
        let a = MockAdapter::new("a", Behaviour::Price(900.0));
        let b = MockAdapter::new("b", Behaviour::Fail);
        let resolver = PriceResolver::new(
            vec![
                Tier::new("bank", 3.0).with_adapter(a.clone()),
                Tier::new("international", 8.0).with_adapter(b.clone()),
            ],
            DEFAULT_ATTEMPT_TIMEOUT,
        );

        let reports = resolver.probe().await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].tier, "bank");
        assert_eq!(reports[0].result.as_ref().unwrap().price, 900.0);
        assert!(matches!(reports[1].result, Err(AdapterError::Status(503))));
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }
}
