//! Append-safe durable store for raw snapshot rows.
//!
//! The raw table is a CSV file with columns `id, date, pool, raw_timestamp`.
//! It is append-only: each run appends only rows whose `id` is not already
//! present, so re-running ingestion against the same chain response leaves the
//! table unchanged.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{PoolError, Result};

pub const RAW_HEADER: [&str; 4] = ["id", "date", "pool", "raw_timestamp"];

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One snapshot row as stored in the raw table.
///
/// `date` is the canonical display timestamp produced at ingestion time
/// (or the `"Invalid timestamp"` sentinel); `raw_timestamp` preserves the
/// chain value untouched for debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshot {
    pub id: String,
    pub date: String,
    pub pool: String,
    pub raw_timestamp: String,
}

/// One row read back for aggregation. `raw_timestamp` is not needed there.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub id: String,
    pub date: String,
    pub pool: String,
}

/// Counts reported after an append.
#[derive(Debug, Clone, Copy)]
pub struct AppendOutcome {
    /// Rows newly written by this run.
    pub added: usize,
    /// Distinct ids now present in the table.
    pub total: usize,
}

// ---------------------------------------------------------------------------
// RawStore
// ---------------------------------------------------------------------------

/// Handle on the raw snapshot table.
pub struct RawStore {
    path: PathBuf,
}

impl RawStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the set of ids already present in the table.
    ///
    /// Degrades instead of failing: a missing file means nothing is stored
    /// yet, and an unreadable or malformed table (no `id` column, mid-file
    /// read error) logs the condition and returns the empty set, which makes
    /// the caller treat every incoming row as new. Ingestion must never fail
    /// solely because the dedup index is unreadable; the trade-off is that a
    /// corrupted table can reintroduce duplicates on the next run.
    pub fn existing_ids(&self) -> HashSet<String> {
        if !self.path.exists() {
            return HashSet::new();
        }

        let mut rdr = match csv::ReaderBuilder::new().flexible(true).from_path(&self.path) {
            Ok(rdr) => rdr,
            Err(e) => {
                warn!("raw table unreadable, skipping duplicate check: {e}");
                return HashSet::new();
            }
        };

        let headers = match rdr.headers() {
            Ok(headers) => headers.clone(),
            Err(e) => {
                warn!("raw table header unreadable, skipping duplicate check: {e}");
                return HashSet::new();
            }
        };

        let Some(id_idx) = headers.iter().position(|h| h == "id") else {
            warn!("raw table has no id column, skipping duplicate check");
            return HashSet::new();
        };

        let mut ids = HashSet::new();
        for record in rdr.records() {
            match record {
                Ok(record) => {
                    if let Some(id) = record.get(id_idx) {
                        ids.insert(id.to_string());
                    }
                }
                Err(e) => {
                    warn!("raw table read error, skipping duplicate check: {e}");
                    return HashSet::new();
                }
            }
        }
        ids
    }

    /// Append the snapshots whose id is not yet in the table.
    ///
    /// Writes the header first if the table did not previously exist. Rows
    /// already present are left untouched; existing ids are never rewritten.
    pub fn append_new(&self, snapshots: &[RawSnapshot]) -> Result<AppendOutcome> {
        let existing = self.existing_ids();
        let new_rows: Vec<&RawSnapshot> = snapshots
            .iter()
            .filter(|snap| !existing.contains(&snap.id))
            .collect();

        if new_rows.is_empty() {
            info!("no new entries found, existing entries: {}", existing.len());
            return Ok(AppendOutcome {
                added: 0,
                total: existing.len(),
            });
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file_exists = self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut wtr = csv::Writer::from_writer(file);

        if !file_exists {
            wtr.write_record(RAW_HEADER)?;
        }
        for snap in &new_rows {
            wtr.write_record([&snap.id, &snap.date, &snap.pool, &snap.raw_timestamp])?;
        }
        wtr.flush()?;

        let outcome = AppendOutcome {
            added: new_rows.len(),
            total: existing.len() + new_rows.len(),
        };
        info!(
            "added {} new entries, total stored: {}",
            outcome.added, outcome.total
        );
        Ok(outcome)
    }

    /// Read the full history for aggregation.
    ///
    /// The table must carry `id`, `date` and `pool` columns; individual rows
    /// missing a column are skipped with a warning rather than aborting the
    /// read.
    pub fn read_all(&self) -> Result<Vec<StoredRow>> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        let headers = rdr.headers()?.clone();
        let idx = |name: &str| headers.iter().position(|h| h == name);
        let (Some(id_idx), Some(date_idx), Some(pool_idx)) = (idx("id"), idx("date"), idx("pool"))
        else {
            return Err(PoolError::DataShape(format!(
                "raw table {} is missing one of the id/date/pool columns",
                self.path.display()
            )));
        };

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            match (record.get(id_idx), record.get(date_idx), record.get(pool_idx)) {
                (Some(id), Some(date), Some(pool)) => rows.push(StoredRow {
                    id: id.to_string(),
                    date: date.to_string(),
                    pool: pool.to_string(),
                }),
                _ => warn!("raw table row {} has missing columns, skipped", line + 2),
            }
        }
        Ok(rows)
    }
}
