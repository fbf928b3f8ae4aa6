//! Daily aggregation of raw snapshot rows and emission of the aggregate
//! table.
//!
//! Aggregation always recomputes over the entire raw history and rewrites the
//! aggregate table from scratch; only ingestion appends.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::AggregateConfig;
use crate::dates::day_of;
use crate::error::{PoolError, Result};
use crate::parse::{parse_pool_field, PoolParse};
use crate::store::RawStore;

pub const AGGREGATE_HEADER: [&str; 4] = ["id", "day", "avgpool", "numberofentries"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One successfully-parsed snapshot, reduced to its day and tier amounts.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub day: String,
    pub entries: BTreeMap<String, Decimal>,
}

/// Per-day mean of each tier key across the day's contributing snapshots.
///
/// `averages` holds only keys present in at least one contributing snapshot;
/// a key missing from a snapshot does not count as zero in the denominator.
#[derive(Debug, Clone)]
pub struct DailyAggregate {
    /// 1-based sequential id assigned in ascending day order.
    pub id: usize,
    pub day: String,
    pub averages: BTreeMap<String, Decimal>,
    /// Count of snapshots that contributed to this day.
    pub entries: usize,
}

/// Report returned by one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Rows read from the raw table.
    pub total_rows: usize,
    /// Rows whose pool field parsed successfully.
    pub parsed_rows: usize,
    /// Row-level parse failures, one message per excluded row.
    pub skipped: Vec<String>,
    /// `(day, contributing snapshots)` in output order.
    pub days: Vec<(String, usize)>,
}

#[derive(Serialize)]
struct AvgPoolEntry<'a> {
    key: &'a str,
    value: String,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Group parsed records by day and compute per-key averages.
///
/// Days arrive in ascending order via the `BTreeMap` grouping; ids are
/// assigned 1-based in that order. For each key the denominator is the count
/// of records containing the key, not the day's total record count. Days
/// with no parsed records simply do not appear.
pub fn build_daily_aggregates(records: Vec<ParsedRecord>) -> Vec<DailyAggregate> {
    let mut buckets: BTreeMap<String, Vec<BTreeMap<String, Decimal>>> = BTreeMap::new();
    for record in records {
        buckets.entry(record.day).or_default().push(record.entries);
    }

    buckets
        .into_iter()
        .enumerate()
        .map(|(idx, (day, pools))| {
            let keys: BTreeSet<&String> = pools.iter().flat_map(|p| p.keys()).collect();

            let mut averages = BTreeMap::new();
            for key in keys {
                let mut sum = Decimal::ZERO;
                let mut count: u64 = 0;
                for pool in &pools {
                    if let Some(amount) = pool.get(key) {
                        sum += *amount;
                        count += 1;
                    }
                }
                averages.insert(key.clone(), sum / Decimal::from(count));
            }

            DailyAggregate {
                id: idx + 1,
                day,
                entries: pools.len(),
                averages,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

/// Rewrite the aggregate table from scratch.
///
/// `avgpool` is emitted as a JSON array of `{key, value}` pairs in sorted key
/// order, each value formatted to 4 decimals with the unit suffix attached.
pub fn write_aggregates(
    path: &Path,
    aggregates: &[DailyAggregate],
    unit_suffix: &str,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(AGGREGATE_HEADER)?;
    for agg in aggregates {
        let avgpool: Vec<AvgPoolEntry<'_>> = agg
            .averages
            .iter()
            .map(|(key, amount)| AvgPoolEntry {
                key,
                value: format!("{:.4}{}", amount.round_dp(4), unit_suffix),
            })
            .collect();
        wtr.write_record([
            agg.id.to_string(),
            agg.day.clone(),
            serde_json::to_string(&avgpool)?,
            agg.entries.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Aggregation run
// ---------------------------------------------------------------------------

/// Read the full raw history, aggregate it per day and rewrite the aggregate
/// table.
///
/// Per-row parse failures exclude only that row and are collected in the
/// report; an entirely empty raw table aborts the run without touching the
/// output.
pub fn run(cfg: &AggregateConfig) -> Result<AggregateReport> {
    let store = RawStore::new(&cfg.raw_table);
    let rows = store.read_all()?;
    let total_rows = rows.len();
    info!("loaded {total_rows} raw rows from {}", cfg.raw_table.display());

    if rows.is_empty() {
        return Err(PoolError::EmptyResult(format!(
            "no rows in raw table {}",
            cfg.raw_table.display()
        )));
    }

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for row in &rows {
        match parse_pool_field(&row.pool, &cfg.unit_suffix) {
            PoolParse::Parsed(entries) => records.push(ParsedRecord {
                day: day_of(&row.date),
                entries,
            }),
            PoolParse::Failed(reason) => {
                warn!("skipping snapshot {}: {reason}", row.id);
                skipped.push(format!("{}: {reason}", row.id));
            }
        }
    }
    let parsed_rows = records.len();
    if !skipped.is_empty() {
        warn!("{} rows could not be parsed and were skipped", skipped.len());
    }

    let aggregates = build_daily_aggregates(records);
    write_aggregates(&cfg.aggregate_table, &aggregates, &cfg.unit_suffix)?;
    info!(
        "aggregated {parsed_rows} rows into {} days, written to {}",
        aggregates.len(),
        cfg.aggregate_table.display()
    );

    Ok(AggregateReport {
        total_rows,
        parsed_rows,
        skipped,
        days: aggregates
            .iter()
            .map(|agg| (agg.day.clone(), agg.entries))
            .collect(),
    })
}
