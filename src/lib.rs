//! TLM mine-pool tracker.
//!
//! Periodically collects pool-balance snapshots from the Alien Worlds
//! `minepooldata` table on the WAX chain, persists them to an append-safe CSV
//! store, aggregates the raw history into daily per-tier averages, and
//! renders the result as bar charts.
//!
//! The three phases (ingest, aggregate, render) are independent synchronous
//! batch jobs intended to be scheduled externally, one run at a time. Each
//! returns a structured report so callers can inspect outcomes
//! programmatically; record-level problems are additionally logged via the
//! `log` facade.
//!
//! # Quick start
//!
//! ```no_run
//! use tlm_pools::PoolTracker;
//!
//! let tracker = PoolTracker::builder().build().unwrap();
//!
//! let ingested = tracker.ingest().unwrap();
//! println!("added {} of {} fetched rows", ingested.added, ingested.fetched);
//!
//! let aggregated = tracker.aggregate().unwrap();
//! println!("{} days summarized", aggregated.days.len());
//!
//! tracker.render_charts().unwrap();
//! ```

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod store;

pub use aggregate::{AggregateReport, DailyAggregate, ParsedRecord};
pub use chart::{ChartReport, ChartWindow};
pub use config::{AggregateConfig, ChartConfig, IngestConfig};
pub use error::{PoolError, Result};
pub use fetch::IngestReport;
pub use parse::PoolParse;
pub use store::{RawSnapshot, RawStore};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// PoolTrackerBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`PoolTracker`].
///
/// Use [`PoolTracker::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](PoolTrackerBuilder::build).
pub struct PoolTrackerBuilder {
    data_dir: Option<PathBuf>,
    endpoint: String,
    code: String,
    scope: String,
    table: String,
    limit: u32,
    timeout: Duration,
    unit_suffix: String,
    raw_table: Option<PathBuf>,
    aggregate_table: Option<PathBuf>,
    chart_dir: Option<PathBuf>,
    windows: Vec<ChartWindow>,
}

impl Default for PoolTrackerBuilder {
    fn default() -> Self {
        Self {
            data_dir: None,
            endpoint: config::DEFAULT_ENDPOINT.to_string(),
            code: config::DEFAULT_CODE.to_string(),
            scope: config::DEFAULT_SCOPE.to_string(),
            table: config::DEFAULT_TABLE.to_string(),
            limit: config::DEFAULT_LIMIT,
            timeout: Duration::from_secs(10),
            unit_suffix: config::UNIT_SUFFIX.to_string(),
            raw_table: None,
            aggregate_table: None,
            chart_dir: None,
            windows: vec![
                ChartWindow::Full,
                ChartWindow::LastDays(30),
                ChartWindow::LastDays(7),
            ],
        }
    }
}

impl PoolTrackerBuilder {
    /// Set the directory holding the durable tables and chart output.
    ///
    /// If not set, the platform-appropriate data directory is used
    /// (e.g. `~/.local/share/tlm-pools` on Linux).
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the chain API endpoint queried for table rows.
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the contract account, scope and table name queried on chain.
    pub fn contract<S: Into<String>>(mut self, code: S, scope: S, table: S) -> Self {
        self.code = code.into();
        self.scope = scope.into();
        self.table = table.into();
        self
    }

    /// Set the maximum number of rows fetched per ingestion run.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the HTTP request timeout. Defaults to 10 seconds; there is no
    /// retry loop.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the unit marker trailing pool amounts. Defaults to `" TLM"`.
    pub fn unit_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.unit_suffix = suffix.into();
        self
    }

    /// Override the raw table path (defaults to `minepooldata.csv` in the
    /// data directory).
    pub fn raw_table<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.raw_table = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the aggregate table path (defaults to `avgpooldata.csv` in
    /// the data directory).
    pub fn aggregate_table<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.aggregate_table = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the chart output directory (defaults to `pool_plots` in the
    /// data directory).
    pub fn chart_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.chart_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the time windows rendered per tier key.
    pub fn windows(mut self, windows: Vec<ChartWindow>) -> Self {
        self.windows = windows;
        self
    }

    /// Build the tracker, creating the data directory if needed.
    pub fn build(self) -> Result<PoolTracker> {
        let data_dir = self.data_dir.unwrap_or_else(config::default_data_dir);
        fs::create_dir_all(&data_dir)?;

        let raw_table = self
            .raw_table
            .unwrap_or_else(|| data_dir.join(config::RAW_TABLE_FILE));
        let aggregate_table = self
            .aggregate_table
            .unwrap_or_else(|| data_dir.join(config::AGGREGATE_TABLE_FILE));
        let chart_dir = self
            .chart_dir
            .unwrap_or_else(|| data_dir.join(config::CHART_DIR));

        Ok(PoolTracker {
            ingest_cfg: IngestConfig {
                endpoint: self.endpoint,
                code: self.code,
                scope: self.scope,
                table: self.table,
                limit: self.limit,
                timeout: self.timeout,
                raw_table: raw_table.clone(),
            },
            aggregate_cfg: AggregateConfig {
                raw_table,
                aggregate_table: aggregate_table.clone(),
                unit_suffix: self.unit_suffix.clone(),
            },
            chart_cfg: ChartConfig {
                aggregate_table,
                output_dir: chart_dir,
                unit_suffix: self.unit_suffix,
                windows: self.windows,
                image_size: (1500, 800),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// PoolTracker
// ---------------------------------------------------------------------------

/// The main entry point: holds the per-phase configurations and runs the
/// three batch phases.
///
/// Created via [`PoolTracker::builder()`].
pub struct PoolTracker {
    ingest_cfg: IngestConfig,
    aggregate_cfg: AggregateConfig,
    chart_cfg: ChartConfig,
}

impl PoolTracker {
    /// Create a new builder for configuring the tracker.
    pub fn builder() -> PoolTrackerBuilder {
        PoolTrackerBuilder::default()
    }

    /// Fetch the current chain table contents and append unseen snapshots to
    /// the raw store.
    pub fn ingest(&self) -> Result<IngestReport> {
        fetch::run(&self.ingest_cfg)
    }

    /// Recompute the daily aggregate table over the full raw history.
    pub fn aggregate(&self) -> Result<AggregateReport> {
        aggregate::run(&self.aggregate_cfg)
    }

    /// Render all bar charts from the aggregate table.
    pub fn render_charts(&self) -> Result<ChartReport> {
        chart::run(&self.chart_cfg)
    }

    // -- Config accessors ---------------------------------------------------

    pub fn ingest_config(&self) -> &IngestConfig {
        &self.ingest_cfg
    }

    pub fn aggregate_config(&self) -> &AggregateConfig {
        &self.aggregate_cfg
    }

    pub fn chart_config(&self) -> &ChartConfig {
        &self.chart_cfg
    }
}

impl fmt::Display for PoolTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PoolTracker(table={}/{}, raw={}, aggregate={}, charts={})",
            self.ingest_cfg.code,
            self.ingest_cfg.table,
            self.aggregate_cfg.raw_table.display(),
            self.aggregate_cfg.aggregate_table.display(),
            self.chart_cfg.output_dir.display(),
        )
    }
}
