//! Unbounded CSV log, one row per quote, appended in production order.

use super::StoreError;
use crate::core::quote::Quote;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const COLUMNS: [&str; 6] = ["timestamp", "source", "price", "raw_text", "error", "note"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularRow {
    pub timestamp: String,
    pub source: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub price: Option<f64>,
    pub raw_text: Option<String>,
    pub error: Option<String>,
    pub note: Option<String>,
}

impl TabularRow {
    /// Parses the timestamp column. Accepts RFC 3339 and offset-less ISO
    /// timestamps, the latter read as local time.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).single())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

impl From<&Quote> for TabularRow {
    fn from(quote: &Quote) -> Self {
        Self {
            timestamp: quote.timestamp.to_rfc3339(),
            source: quote.source.clone(),
            price: quote.price,
            raw_text: quote.raw_text.clone(),
            error: quote.error.clone(),
            note: quote.note.clone(),
        }
    }
}

pub struct TabularLog {
    path: PathBuf,
    lock: RwLock<()>,
}

impl TabularLog {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let log = Self {
            path,
            lock: RwLock::new(()),
        };
        let needs_header = fs::metadata(&log.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        if needs_header {
            log.write_unlocked(&[])?;
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, quote: &Quote) -> Result<(), StoreError> {
        let _guard = self.lock.write();
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::write(&self.path, e))?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        wtr.serialize(TabularRow::from(quote))
            .map_err(|e| StoreError::write(&self.path, e))?;
        wtr.flush().map_err(|e| StoreError::write(&self.path, e))
    }

    pub fn rows(&self) -> Result<Vec<TabularRow>, StoreError> {
        let _guard = self.lock.read();
        self.read_unlocked()
    }

    /// Writes the log as a spreadsheet-friendly CSV (UTF-8 with BOM).
    pub fn export(&self, destination: &Path) -> Result<usize, StoreError> {
        let rows = self.rows()?;

        let mut file =
            File::create(destination).map_err(|e| StoreError::export(destination, e))?;
        file.write_all(UTF8_BOM)
            .map_err(|e| StoreError::export(destination, e))?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        wtr.write_record(COLUMNS)
            .map_err(|e| StoreError::export(destination, e))?;
        for row in &rows {
            wtr.serialize(row)
                .map_err(|e| StoreError::export(destination, e))?;
        }
        wtr.flush().map_err(|e| StoreError::export(destination, e))?;
        Ok(rows.len())
    }

    pub(super) fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }

    /// Rows that would survive a prune at `cutoff`. Rows whose timestamp
    /// cannot be parsed are kept. Caller holds the lock.
    pub(super) fn retained_unlocked(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<(Vec<TabularRow>, usize), StoreError> {
        let rows = self.read_unlocked()?;
        let before = rows.len();
        let kept: Vec<TabularRow> = rows
            .into_iter()
            .filter(|row| row.parsed_timestamp().is_none_or(|ts| ts >= cutoff))
            .collect();
        let removed = before - kept.len();
        Ok((kept, removed))
    }

    pub(super) fn read_unlocked(&self) -> Result<Vec<TabularRow>, StoreError> {
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| StoreError::read(&self.path, e))?;
        rdr.deserialize()
            .collect::<Result<Vec<TabularRow>, _>>()
            .map_err(|e| StoreError::read(&self.path, e))
    }

    /// Rewrites the whole file (header plus `rows`) through a temp file.
    pub(super) fn write_unlocked(&self, rows: &[TabularRow]) -> Result<(), StoreError> {
        let staged = self.stage_unlocked(rows)?;
        self.commit_unlocked(&staged)
    }

    /// Writes header plus `rows` to the sibling temp file without touching
    /// the log.
    pub(super) fn stage_unlocked(&self, rows: &[TabularRow]) -> Result<PathBuf, StoreError> {
        let tmp = self.path.with_extension("csv.tmp");
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)
            .map_err(|e| StoreError::write(&tmp, e))?;
        wtr.write_record(COLUMNS)
            .map_err(|e| StoreError::write(&tmp, e))?;
        for row in rows {
            wtr.serialize(row).map_err(|e| StoreError::write(&tmp, e))?;
        }
        wtr.flush().map_err(|e| StoreError::write(&tmp, e))?;
        drop(wtr);
        Ok(tmp)
    }

    pub(super) fn commit_unlocked(&self, staged: &Path) -> Result<(), StoreError> {
        fs::rename(staged, &self.path).map_err(|e| StoreError::write(&self.path, e))
    }
}
