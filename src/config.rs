use std::path::PathBuf;
use std::time::Duration;

use crate::chart::ChartWindow;

/// Default WAX chain API endpoint for table queries.
pub const DEFAULT_ENDPOINT: &str = "https://wax.greymass.com/v1/chain/get_table_rows";
/// Contract account holding the mine pool table.
pub const DEFAULT_CODE: &str = "hq.mu";
pub const DEFAULT_SCOPE: &str = "hq.mu";
pub const DEFAULT_TABLE: &str = "minepooldata";
pub const DEFAULT_LIMIT: u32 = 1000;

pub const USER_AGENT: &str = "TLM_Pools Data Collector";

/// Unit marker trailing every pool amount (e.g. "0.1083 TLM").
pub const UNIT_SUFFIX: &str = " TLM";

pub const RAW_TABLE_FILE: &str = "minepooldata.csv";
pub const AGGREGATE_TABLE_FILE: &str = "avgpooldata.csv";
pub const CHART_DIR: &str = "pool_plots";

pub fn default_data_dir() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        data.join("tlm-pools")
    } else {
        PathBuf::from(".tlm-pools")
    }
}

// ---------------------------------------------------------------------------
// Per-phase configuration
// ---------------------------------------------------------------------------

/// Configuration for the ingestion phase: where to fetch snapshot rows from
/// and which durable table to append them to.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub endpoint: String,
    pub code: String,
    pub scope: String,
    pub table: String,
    /// Maximum number of rows requested from the chain in one call.
    pub limit: u32,
    /// Fixed HTTP timeout; there is no retry loop, a timed-out fetch simply
    /// ends the run.
    pub timeout: Duration,
    pub raw_table: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            code: DEFAULT_CODE.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            table: DEFAULT_TABLE.to_string(),
            limit: DEFAULT_LIMIT,
            timeout: Duration::from_secs(10),
            raw_table: default_data_dir().join(RAW_TABLE_FILE),
        }
    }
}

/// Configuration for the aggregation phase: raw table in, aggregate table out.
#[derive(Debug, Clone)]
pub struct AggregateConfig {
    pub raw_table: PathBuf,
    pub aggregate_table: PathBuf,
    /// Unit marker stripped from amounts on parse and re-attached on emission.
    pub unit_suffix: String,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        let data = default_data_dir();
        Self {
            raw_table: data.join(RAW_TABLE_FILE),
            aggregate_table: data.join(AGGREGATE_TABLE_FILE),
            unit_suffix: UNIT_SUFFIX.to_string(),
        }
    }
}

/// Configuration for the chart rendering phase.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub aggregate_table: PathBuf,
    pub output_dir: PathBuf,
    pub unit_suffix: String,
    /// Time windows rendered per tier key, each producing one image.
    pub windows: Vec<ChartWindow>,
    /// Pixel size of a single-tier chart.
    pub image_size: (u32, u32),
}

impl Default for ChartConfig {
    fn default() -> Self {
        let data = default_data_dir();
        Self {
            aggregate_table: data.join(AGGREGATE_TABLE_FILE),
            output_dir: data.join(CHART_DIR),
            unit_suffix: UNIT_SUFFIX.to_string(),
            windows: vec![
                ChartWindow::Full,
                ChartWindow::LastDays(30),
                ChartWindow::LastDays(7),
            ],
            image_size: (1500, 800),
        }
    }
}
