//! Bounded JSON log of full quote records, oldest first.

use super::StoreError;
use crate::core::quote::Quote;
use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct OrderedLog {
    path: PathBuf,
    cap: usize,
    lock: RwLock<()>,
}

impl OrderedLog {
    pub fn open(path: PathBuf, cap: usize) -> Result<Self, StoreError> {
        let log = Self {
            path,
            cap: cap.max(1),
            lock: RwLock::new(()),
        };
        if !log.path.exists() {
            log.write_unlocked(&[])?;
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, quote: &Quote) -> Result<(), StoreError> {
        let _guard = self.lock.write();
        let mut records = self
            .read_unlocked()
            .map_err(|e| StoreError::write(&self.path, e))?;
        records.push(quote.clone());
        if records.len() > self.cap {
            let overflow = records.len() - self.cap;
            records.drain(..overflow);
            debug!(dropped = overflow, "Ordered log over capacity");
        }
        self.write_unlocked(&records)
    }

    /// Returns up to `limit` most recent records in chronological order.
    pub fn recent(&self, limit: usize) -> Result<Vec<Quote>, StoreError> {
        let _guard = self.lock.read();
        let mut records = self.read_unlocked()?;
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }

    #[cfg(test)]
    fn len(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.read();
        Ok(self.read_unlocked()?.len())
    }

    #[cfg(test)]
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub(super) fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }

    /// Records that would survive a prune at `cutoff`. Caller holds the lock.
    pub(super) fn retained_unlocked(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<(Vec<Quote>, usize), StoreError> {
        let records = self.read_unlocked()?;
        let before = records.len();
        let kept: Vec<Quote> = records
            .into_iter()
            .filter(|q| q.timestamp >= cutoff)
            .collect();
        let removed = before - kept.len();
        Ok((kept, removed))
    }

    pub(super) fn read_unlocked(&self) -> Result<Vec<Quote>, StoreError> {
        let bytes = fs::read(&self.path).map_err(|e| StoreError::read(&self.path, e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| StoreError::read(&self.path, e))
    }

    /// Replaces the file contents through a temp file and rename.
    pub(super) fn write_unlocked(&self, records: &[Quote]) -> Result<(), StoreError> {
        let staged = self.stage_unlocked(records)?;
        self.commit_unlocked(&staged)
    }

    /// Writes `records` to the sibling temp file without touching the log.
    pub(super) fn stage_unlocked(&self, records: &[Quote]) -> Result<PathBuf, StoreError> {
        let json =
            serde_json::to_vec_pretty(records).map_err(|e| StoreError::write(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::write(&tmp, e))?;
        Ok(tmp)
    }

    pub(super) fn commit_unlocked(&self, staged: &Path) -> Result<(), StoreError> {
        fs::rename(staged, &self.path).map_err(|e| StoreError::write(&self.path, e))
    }
}
