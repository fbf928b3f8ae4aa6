//! Ingestion: fetch snapshot rows from the chain table endpoint and append
//! them to the raw store.
//!
//! The fetch is a single blocking POST with a fixed timeout and no retry
//! loop; a failed or timed-out request ends the run and leaves the durable
//! table in its last-good state.

use chrono::NaiveDateTime;
use log::warn;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{self, IngestConfig};
use crate::error::{PoolError, Result};
use crate::store::{RawSnapshot, RawStore};

/// Sentinel stored in the `date` column when the chain timestamp does not
/// parse. Deliberately loud so bad rows are findable downstream.
pub const INVALID_TIMESTAMP: &str = "Invalid timestamp";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TableRowsRequest<'a> {
    code: &'a str,
    scope: &'a str,
    table: &'a str,
    limit: u32,
    reverse: bool,
    json: bool,
}

#[derive(Debug, Deserialize)]
struct TableRowsResponse {
    #[serde(default)]
    rows: Vec<Value>,
}

// ---------------------------------------------------------------------------
// ChainClient
// ---------------------------------------------------------------------------

/// Thin blocking client for the chain's `get_table_rows` endpoint.
pub struct ChainClient {
    client: Client,
    endpoint: String,
}

impl ChainClient {
    pub fn new(endpoint: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Fetch the newest `limit` rows of the given contract table.
    pub fn fetch_rows(&self, code: &str, scope: &str, table: &str, limit: u32) -> Result<Vec<Value>> {
        let payload = TableRowsRequest {
            code,
            scope,
            table,
            limit,
            reverse: true,
            json: true,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()?
            .error_for_status()?;
        let body: TableRowsResponse = resp.json()?;
        Ok(body.rows)
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

/// Strict ingestion-time timestamp canonicalizer.
///
/// Reformats an ISO-like timestamp (`T`- or space-separated, with or without
/// fractional seconds) into the `"YYYY-MM-DD HH:MM:SS"` display form. Unlike
/// the lenient [`dates::day_of`](crate::dates::day_of) this records the
/// [`INVALID_TIMESTAMP`] sentinel on failure instead of passing the raw value
/// through silently.
pub fn canonical_timestamp(raw: &str) -> String {
    let cleaned = raw.trim().replace('T', " ");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%d %H:%M:%S%.f") {
        return dt.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    // Date-only timestamps occur on freshly created tables.
    if let Ok(date) = chrono::NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d") {
        return format!("{} 00:00:00", date.format("%Y-%m-%d"));
    }
    INVALID_TIMESTAMP.to_string()
}

/// Validate one response row and convert it into a [`RawSnapshot`].
///
/// Required fields are checked explicitly before access; a missing field
/// rejects only this row. The pool-bucket field may arrive either as a JSON
/// array (the chain's `json: true` form) or as an opaque string; arrays are
/// re-serialized so the store always holds one string column.
pub fn snapshot_from_row(row: &Value) -> std::result::Result<RawSnapshot, String> {
    let obj = row
        .as_object()
        .ok_or_else(|| format!("row is not an object: {row}"))?;

    for field in ["snapshot_id", "snapshot_date", "pool_buckets"] {
        if !obj.contains_key(field) {
            return Err(format!("row missing field `{field}`: {row}"));
        }
    }

    let id = json_to_plain_string(&obj["snapshot_id"]);
    let raw_timestamp = json_to_plain_string(&obj["snapshot_date"]);
    let pool = match &obj["pool_buckets"] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Ok(RawSnapshot {
        id,
        date: canonical_timestamp(&raw_timestamp),
        pool,
        raw_timestamp,
    })
}

/// String form of a scalar field: strings unquoted, everything else as its
/// JSON representation.
fn json_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Ingestion run
// ---------------------------------------------------------------------------

/// Report returned by one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Rows returned by the chain endpoint.
    pub fetched: usize,
    /// Rows newly appended to the raw table.
    pub added: usize,
    /// Distinct ids now present in the raw table.
    pub total: usize,
    /// Row-level problems (missing fields), one message per rejected row.
    pub skipped: Vec<String>,
}

/// Fetch the current table contents and append the unseen rows to the raw
/// store.
///
/// Network failures, an empty response and top-level I/O failures abort the
/// run with an error; per-row shape problems only exclude the affected row.
pub fn run(cfg: &IngestConfig) -> Result<IngestReport> {
    let client = ChainClient::new(&cfg.endpoint, cfg.timeout)?;
    let rows = client.fetch_rows(&cfg.code, &cfg.scope, &cfg.table, cfg.limit)?;

    if rows.is_empty() {
        return Err(PoolError::EmptyResult(
            "no rows in table response".to_string(),
        ));
    }

    let mut snapshots = Vec::new();
    let mut skipped = Vec::new();
    for row in &rows {
        match snapshot_from_row(row) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(reason) => {
                warn!("skipping row: {reason}");
                skipped.push(reason);
            }
        }
    }

    if snapshots.is_empty() {
        return Err(PoolError::DataShape(
            "every response row was missing required fields".to_string(),
        ));
    }

    let store = RawStore::new(&cfg.raw_table);
    let outcome = store.append_new(&snapshots)?;

    Ok(IngestReport {
        fetched: rows.len(),
        added: outcome.added,
        total: outcome.total,
        skipped,
    })
}
