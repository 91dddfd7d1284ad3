//! Source adapter abstraction

use crate::core::quote::RawQuote;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Reasons a single adapter attempt can fail. The resolver recovers from all
/// of them by moving on to the next adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("unparseable response: {0}")]
    Parse(String),

    #[error("no price found in response")]
    Empty,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("adapter panicked")]
    Panicked,
}

/// One provider of raw gold prices.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human readable provider name.
    fn name(&self) -> &str;

    /// Remote location the adapter reads from, if any.
    fn endpoint(&self) -> Option<&str> {
        None
    }

    /// Attempts to read the current price. Called at most once per cycle.
    async fn attempt(&self) -> Result<RawQuote, AdapterError>;
}

/// Rejects readings that parsed but carry no usable price.
pub fn ensure_usable(raw: RawQuote) -> Result<RawQuote, AdapterError> {
    if raw.price.is_finite() && raw.price > 0.0 {
        Ok(raw)
    } else {
        Err(AdapterError::Empty)
    }
}
