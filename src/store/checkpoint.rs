//! Per-account view of the output tree.
//!
//! The filesystem is the durable record: nothing else is persisted
//! between runs. `StoreIndex::scan` reads the tree once per session and
//! the result serves both the fetch checkpoint (newest date + 1 day)
//! and the duplicate guard's lookups, which are answered from memory
//! instead of re-scanning the directory for every candidate.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{GrabError, Result};

/// In-memory index of one account's stored attachments.
#[derive(Debug, Default)]
pub struct StoreIndex {
    /// Extension directory name → its state.
    dirs: HashMap<String, DirState>,
}

#[derive(Debug, Default)]
struct DirState {
    /// Newest date parsed from any filename in this directory.
    newest: Option<NaiveDate>,
    /// Every filename present in this directory.
    files: HashSet<String>,
}

impl StoreIndex {
    /// Build the index by scanning `<account>/*/*`.
    ///
    /// A missing account directory yields an empty index (first run).
    /// Filenames without a parseable date prefix are recorded but
    /// excluded from date bookkeeping. An unreadable directory is an
    /// error for this account only.
    pub fn scan(account_dir: &Path) -> Result<Self> {
        let mut index = Self::default();
        if !account_dir.is_dir() {
            return Ok(index);
        }

        let entries = fs::read_dir(account_dir).map_err(|e| GrabError::io(account_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| GrabError::io(account_dir, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let ext = entry.file_name().to_string_lossy().into_owned();

            let files = fs::read_dir(&path).map_err(|e| GrabError::io(&path, e))?;
            for file in files {
                let file = file.map_err(|e| GrabError::io(&path, e))?;
                if !file.path().is_file() {
                    continue;
                }
                let name = file.file_name().to_string_lossy().into_owned();
                index.record_existing(&ext, &name);
            }
        }
        Ok(index)
    }

    fn record_existing(&mut self, ext: &str, filename: &str) {
        let state = self.dirs.entry(ext.to_string()).or_default();
        match parse_leading_date(filename) {
            Some(date) => {
                if state.newest.is_none_or(|newest| date > newest) {
                    state.newest = Some(date);
                }
            }
            None => {
                tracing::debug!(ext = %ext, filename = %filename, "file without date prefix, not counted for checkpoint");
            }
        }
        state.files.insert(filename.to_string());
    }

    /// The resume date for the next fetch: newest stored date + 1 day,
    /// or `None` when nothing dated is stored yet (fetch everything).
    pub fn checkpoint(&self) -> Option<NaiveDate> {
        self.dirs
            .values()
            .filter_map(|d| d.newest)
            .max()
            .and_then(|newest| newest.succ_opt())
    }

    /// `true` when an equal-or-newer-dated file already exists in the
    /// extension directory, superseding the candidate.
    pub fn is_superseded(&self, ext: &str, date: NaiveDate) -> bool {
        self.dirs
            .get(ext)
            .and_then(|d| d.newest)
            .is_some_and(|newest| newest >= date)
    }

    /// `true` when the exact filename already exists in the extension
    /// directory.
    pub fn contains(&self, ext: &str, filename: &str) -> bool {
        self.dirs.get(ext).is_some_and(|d| d.files.contains(filename))
    }

    /// Record a freshly written file.
    pub fn record(&mut self, ext: &str, filename: &str, date: NaiveDate) {
        let state = self.dirs.entry(ext.to_string()).or_default();
        if state.newest.is_none_or(|newest| date > newest) {
            state.newest = Some(date);
        }
        state.files.insert(filename.to_string());
    }

    /// Total number of files known to the index.
    pub fn file_count(&self) -> usize {
        self.dirs.values().map(|d| d.files.len()).sum()
    }
}

/// Parse the leading `YYYY-MM-DD` segment of a stored filename.
pub fn parse_leading_date(filename: &str) -> Option<NaiveDate> {
    let prefix = filename.split('_').next().unwrap_or(filename);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
