//! Core domain types: quotes, sources, tiered resolution and scheduling

pub mod config;
pub mod log;
pub mod quote;
pub mod resolver;
pub mod scheduler;
pub mod source;

// Re-export main types for cleaner imports
pub use quote::{PRICE_UNIT, PriceSummary, Quote, RawQuote, Statistics};
pub use resolver::{PriceResolver, ProbeReport, Tier};
pub use scheduler::{Scheduler, SchedulerSettings, SchedulerStatus};
pub use source::{AdapterError, SourceAdapter};
