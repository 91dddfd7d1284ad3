pub mod ordered;
pub mod stats;
pub mod tabular;

use crate::core::quote::{PRICE_UNIT, Quote, Statistics};
use chrono::{DateTime, Utc};
use ordered::OrderedLog;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tabular::{TabularLog, TabularRow};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const ORDERED_LOG_FILE: &str = "gold_prices.json";
pub const TABULAR_LOG_FILE: &str = "gold_prices.csv";
pub const DEFAULT_ORDERED_LOG_CAP: usize = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("cannot write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("cannot export to {}: {reason}", path.display())]
    Export { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn read(path: &Path, reason: impl Display) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, reason: impl Display) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn export(path: &Path, reason: impl Display) -> Self {
        Self::Export {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Result of an append: the stamped record plus any per-file failures.
#[derive(Debug)]
pub struct AppendOutcome {
    pub record: Quote,
    pub failures: Vec<StoreError>,
}

impl AppendOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Append-only quote history kept as a bounded JSON log and an unbounded
/// CSV log. Each file has its own writer lock; readers never observe a
/// half-written record.
pub struct PriceStore {
    ordered: OrderedLog,
    tabular: TabularLog,
}

impl PriceStore {
    pub fn open(data_dir: &Path, ordered_log_cap: usize) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::write(data_dir, e))?;
        let ordered = OrderedLog::open(data_dir.join(ORDERED_LOG_FILE), ordered_log_cap)?;
        let tabular = TabularLog::open(data_dir.join(TABULAR_LOG_FILE))?;
        debug!(dir = %data_dir.display(), "Opened price store");
        Ok(Self { ordered, tabular })
    }

    pub fn ordered_log_path(&self) -> &Path {
        self.ordered.path()
    }

    pub fn tabular_log_path(&self) -> &Path {
        self.tabular.path()
    }

    /// Stamps `saved_at` and writes the quote to both logs. A failure on one
    /// log does not stop the write to the other.
    pub fn append(&self, mut quote: Quote) -> AppendOutcome {
        quote.saved_at = Some(Utc::now());

        let mut failures = Vec::new();
        if let Err(e) = self.ordered.append(&quote) {
            warn!(error = %e, "Failed to append to ordered log");
            failures.push(e);
        }
        if let Err(e) = self.tabular.append(&quote) {
            warn!(error = %e, "Failed to append to tabular log");
            failures.push(e);
        }

        let price = quote
            .price
            .map_or("N/A".to_string(), |p| format!("{p:.2}"));
        println!("Price record saved: {price} {PRICE_UNIT}");
        info!(source = %quote.source, price = ?quote.price, "Quote saved");

        AppendOutcome {
            record: quote,
            failures,
        }
    }

    /// Last `limit` records of the ordered log, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<Quote>, StoreError> {
        self.ordered.recent(limit)
    }

    pub fn statistics(&self) -> Result<Statistics, StoreError> {
        Ok(stats::compute(&self.tabular.rows()?))
    }

    /// Statistics restricted to records stamped at or after `cutoff`.
    pub fn statistics_since(&self, cutoff: DateTime<Utc>) -> Result<Statistics, StoreError> {
        Ok(stats::compute_since(&self.tabular.rows()?, cutoff))
    }

    pub fn export(&self, destination: &Path) -> Result<usize, StoreError> {
        let rows = self.tabular.export(destination)?;
        info!(rows, destination = %destination.display(), "Exported price history");
        Ok(rows)
    }

    /// Removes records older than `now - retention` from both logs.
    pub fn prune(&self, retention: chrono::Duration) -> Result<usize, StoreError> {
        self.prune_before(Utc::now() - retention)
    }

    /// Removes records stamped strictly before `cutoff` from both logs and
    /// returns the number of tabular rows removed. Both logs are locked for
    /// the duration so they reflect the same cutoff.
    ///
    /// Either both logs are pruned or neither is: both replacements are
    /// staged before the first one is committed.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let _ordered_guard = self.ordered.write_guard();
        let _tabular_guard = self.tabular.write_guard();

        let original_quotes = self.ordered.read_unlocked()?;
        let (kept_quotes, ordered_removed) = self.ordered.retained_unlocked(cutoff)?;
        let (kept_rows, tabular_removed) = self.tabular.retained_unlocked(cutoff)?;

        self.replace_both(&kept_quotes, &kept_rows, &original_quotes)?;

        info!(
            %cutoff,
            ordered_removed,
            tabular_removed,
            remaining = kept_rows.len(),
            "Pruned price history"
        );
        Ok(tabular_removed)
    }

    /// Empties the ordered log and truncates the tabular log to its header.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _ordered_guard = self.ordered.write_guard();
        let _tabular_guard = self.tabular.write_guard();

        // An unreadable ordered log has nothing worth restoring.
        let original_quotes = self.ordered.read_unlocked().unwrap_or_default();
        self.replace_both(&[], &[], &original_quotes)?;
        info!("Cleared price history");
        Ok(())
    }

    // Caller holds both write guards.
    fn replace_both(
        &self,
        quotes: &[Quote],
        rows: &[TabularRow],
        original_quotes: &[Quote],
    ) -> Result<(), StoreError> {
        let staged_quotes = self.ordered.stage_unlocked(quotes)?;
        let staged_rows = match self.tabular.stage_unlocked(rows) {
            Ok(path) => path,
            Err(e) => {
                let _ = fs::remove_file(&staged_quotes);
                return Err(e);
            }
        };

        self.ordered.commit_unlocked(&staged_quotes)?;
        if let Err(e) = self.tabular.commit_unlocked(&staged_rows) {
            warn!(error = %e, "Tabular log replace failed, restoring ordered log");
            let _ = fs::remove_file(&staged_rows);
            if let Err(restore) = self.ordered.write_unlocked(original_quotes) {
                error!(error = %restore, "Failed to restore ordered log");
            }
            return Err(e);
        }
        Ok(())
    }
}
