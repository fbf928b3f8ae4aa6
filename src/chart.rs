//! Bar-chart rendering of the daily aggregate table.
//!
//! Loads the aggregate CSV back into per-tier series and renders one PNG per
//! (tier × time window) plus a combined all-tiers grid. Rendering is a direct
//! pass over the already-clean aggregate data; all the parsing leniency lives
//! in [`parse`](crate::parse), which is reused for the `avgpool` column.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use rust_decimal::prelude::ToPrimitive;

use crate::config::ChartConfig;
use crate::error::{PoolError, Result};
use crate::parse::parse_pool_field;

const STEEL_BLUE: RGBColor = RGBColor(70, 130, 180);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One aggregate row prepared for charting.
#[derive(Debug, Clone)]
pub struct DaySample {
    pub day: NaiveDate,
    /// Tier key → average amount. Tiers absent on a day plot as zero bars.
    pub pools: BTreeMap<String, f64>,
    pub entries: u64,
}

/// Time window of a chart, selecting the trailing days plotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartWindow {
    Full,
    LastDays(u32),
}

impl ChartWindow {
    /// Filename suffix, e.g. `"_30days"`. Empty for the full history.
    pub fn suffix(&self) -> String {
        match self {
            ChartWindow::Full => String::new(),
            ChartWindow::LastDays(n) => format!("_{n}days"),
        }
    }

    /// Caption suffix, e.g. `" (Last 30 days)"`.
    pub fn label(&self) -> String {
        match self {
            ChartWindow::Full => String::new(),
            ChartWindow::LastDays(n) => format!(" (Last {n} days)"),
        }
    }

    /// First day kept by this window given the newest day in the series.
    pub fn cutoff(&self, latest: NaiveDate) -> Option<NaiveDate> {
        match self {
            ChartWindow::Full => None,
            ChartWindow::LastDays(n) => Some(latest - chrono::Duration::days(*n as i64)),
        }
    }
}

/// Summary statistics rendered into a chart caption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

impl SeriesStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                avg: 0.0,
                max: 0.0,
                min: 0.0,
            };
        }
        let sum: f64 = values.iter().sum();
        Self {
            avg: sum / values.len() as f64,
            max: values.iter().cloned().fold(f64::MIN, f64::max),
            min: values.iter().cloned().fold(f64::MAX, f64::min),
        }
    }
}

/// Report returned by one chart rendering run.
#[derive(Debug, Clone)]
pub struct ChartReport {
    /// Image files written, in render order.
    pub written: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load the aggregate table into chart-ready day samples, sorted by day.
///
/// A row whose `day` does not parse is skipped with a warning; a row whose
/// `avgpool` does not parse is kept with zero bars for every tier, matching
/// the lenient policy of the aggregation side.
pub fn load_aggregates(path: &Path, unit_suffix: &str) -> Result<Vec<DaySample>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let idx = |name: &str| headers.iter().position(|h| h == name);
    let (Some(day_idx), Some(pool_idx), Some(entries_idx)) =
        (idx("day"), idx("avgpool"), idx("numberofentries"))
    else {
        return Err(PoolError::DataShape(format!(
            "aggregate table {} is missing one of the day/avgpool/numberofentries columns",
            path.display()
        )));
    };

    let mut samples = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let (Some(day_str), Some(pool_str)) = (record.get(day_idx), record.get(pool_idx)) else {
            warn!("aggregate row {} has missing columns, skipped", line + 2);
            continue;
        };
        let Ok(day) = NaiveDate::parse_from_str(day_str, "%Y-%m-%d") else {
            warn!("aggregate row {} has unparseable day '{day_str}', skipped", line + 2);
            continue;
        };

        let parsed = parse_pool_field(pool_str, unit_suffix);
        if !parsed.is_parsed() {
            warn!("aggregate row {} has unparseable avgpool, plotted as zero", line + 2);
        }
        let pools = parsed
            .entries()
            .into_iter()
            .map(|(key, amount)| (key, amount.to_f64().unwrap_or(0.0)))
            .collect();

        let entries = record
            .get(entries_idx)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        samples.push(DaySample { day, pools, entries });
    }

    samples.sort_by_key(|s| s.day);
    Ok(samples)
}

/// Union of tier keys across all loaded samples, in sorted order.
pub fn tier_keys(samples: &[DaySample]) -> BTreeSet<String> {
    samples
        .iter()
        .flat_map(|s| s.pools.keys().cloned())
        .collect()
}

/// Output filename for one (tier, window) chart.
pub fn chart_filename(tier: &str, window: &ChartWindow) -> String {
    format!("pool_{}{}.png", tier, window.suffix())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Draw one bar panel (dates on x, amounts on y) onto a drawing area.
fn draw_bar_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    caption: &str,
    caption_px: i32,
    days: &[NaiveDate],
    values: &[f64],
    y_desc: &str,
) -> Result<()> {
    let n = days.len();
    let max = values.iter().cloned().fold(0.0, f64::max);
    let y_top = if max <= 0.0 { 1.0 } else { max * 1.1 };

    // Denser series get coarser tick labels.
    let span = (days[n - 1] - days[0]).num_days();
    let tick_fmt = if span <= 7 {
        "%a %d.%m.%Y"
    } else if span <= 31 {
        "%d.%m"
    } else {
        "%m/%Y"
    };

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", caption_px))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..n as f64, 0f64..y_top)
        .map_err(|e| PoolError::Chart(e.to_string()))?;

    chart
        .configure_mesh()
        .x_labels(n.min(12))
        .x_label_formatter(&|x| {
            let i = *x as usize;
            days.get(i)
                .map(|d| d.format(tick_fmt).to_string())
                .unwrap_or_default()
        })
        .x_desc("Date")
        .y_desc(y_desc)
        .draw()
        .map_err(|e| PoolError::Chart(e.to_string()))?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            Rectangle::new(
                [(i as f64 + 0.15, 0.0), (i as f64 + 0.85, *v)],
                STEEL_BLUE.filled(),
            )
        }))
        .map_err(|e| PoolError::Chart(e.to_string()))?;

    Ok(())
}

/// Render one tier's bar chart for the given window, returning the file
/// written, or `None` if the window holds no data.
fn render_tier_chart(
    samples: &[DaySample],
    tier: &str,
    window: &ChartWindow,
    cfg: &ChartConfig,
) -> Result<Option<PathBuf>> {
    let latest = match samples.iter().map(|s| s.day).max() {
        Some(latest) => latest,
        None => return Ok(None),
    };
    let kept: Vec<&DaySample> = match window.cutoff(latest) {
        Some(cutoff) => samples.iter().filter(|s| s.day >= cutoff).collect(),
        None => samples.iter().collect(),
    };
    if kept.is_empty() {
        warn!("no data for pool '{tier}' in window{}", window.label());
        return Ok(None);
    }

    let days: Vec<NaiveDate> = kept.iter().map(|s| s.day).collect();
    let values: Vec<f64> = kept
        .iter()
        .map(|s| s.pools.get(tier).copied().unwrap_or(0.0))
        .collect();
    let total_entries: u64 = kept.iter().map(|s| s.entries).sum();
    let stats = SeriesStats::from_values(&values);

    let unit = cfg.unit_suffix.trim();
    let caption = format!(
        "Pool: {tier}{} | avg {:.4} {unit} | max {:.4} {unit} | min {:.4} {unit} | {} days, {} entries",
        window.label(),
        stats.avg,
        stats.max,
        stats.min,
        days.len(),
        total_entries,
    );

    let path = cfg.output_dir.join(chart_filename(tier, window));
    let root = BitMapBackend::new(&path, cfg.image_size).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PoolError::Chart(e.to_string()))?;

    let y_desc = format!("{tier} Pool ({unit})");
    draw_bar_panel(&root, &caption, 28, &days, &values, &y_desc)?;

    root.present().map_err(|e| PoolError::Chart(e.to_string()))?;
    drop(root);
    info!("chart saved: {}", path.display());
    Ok(Some(path))
}

/// Render the combined multi-panel chart: a 3-column grid with one
/// full-history mini chart per tier.
fn render_combined_chart(
    samples: &[DaySample],
    tiers: &BTreeSet<String>,
    cfg: &ChartConfig,
) -> Result<PathBuf> {
    let cols = 3usize;
    let rows = tiers.len().div_ceil(cols);

    let path = cfg.output_dir.join("all_pools.png");
    let size = (2000u32, 100 + 400 * rows as u32);
    let outer = BitMapBackend::new(&path, size).into_drawing_area();
    outer
        .fill(&WHITE)
        .map_err(|e| PoolError::Chart(e.to_string()))?;
    let root = outer
        .titled("All Pools", ("sans-serif", 40))
        .map_err(|e| PoolError::Chart(e.to_string()))?;

    let days: Vec<NaiveDate> = samples.iter().map(|s| s.day).collect();
    let unit = cfg.unit_suffix.trim();

    let areas = root.split_evenly((rows, cols));
    for (tier, area) in tiers.iter().zip(areas.iter()) {
        let values: Vec<f64> = samples
            .iter()
            .map(|s| s.pools.get(tier).copied().unwrap_or(0.0))
            .collect();
        let stats = SeriesStats::from_values(&values);
        let caption = format!("{tier} (avg {:.4} {unit})", stats.avg);
        draw_bar_panel(area, &caption, 22, &days, &values, unit)?;
    }

    root.present().map_err(|e| PoolError::Chart(e.to_string()))?;
    drop(areas);
    drop(root);
    drop(outer);
    info!("combined chart saved: {}", path.display());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Chart run
// ---------------------------------------------------------------------------

/// Render all charts for the current aggregate table.
///
/// Produces the combined grid first, then one image per (tier × window).
/// The output directory is created if missing; existing images are
/// overwritten.
pub fn run(cfg: &ChartConfig) -> Result<ChartReport> {
    let samples = load_aggregates(&cfg.aggregate_table, &cfg.unit_suffix)?;
    if samples.is_empty() {
        return Err(PoolError::EmptyResult(format!(
            "no rows in aggregate table {}",
            cfg.aggregate_table.display()
        )));
    }

    let tiers = tier_keys(&samples);
    if tiers.is_empty() {
        return Err(PoolError::EmptyResult(
            "no tier keys found in aggregate table".to_string(),
        ));
    }
    info!("rendering charts for {} tiers: {:?}", tiers.len(), tiers);

    fs::create_dir_all(&cfg.output_dir)?;

    let mut written = Vec::new();
    written.push(render_combined_chart(&samples, &tiers, cfg)?);

    for tier in &tiers {
        for window in &cfg.windows {
            if let Some(path) = render_tier_chart(&samples, tier, window, cfg)? {
                written.push(path);
            }
        }
    }

    Ok(ChartReport { written })
}
