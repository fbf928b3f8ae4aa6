//! End-to-end tests over the durable tables: raw store in, aggregate table
//! out, exercised through the same phase entry points a scheduler would use.

mod common;

use common::{pool_field, snapshot};
use tlm_pools::aggregate;
use tlm_pools::store::RawStore;
use tlm_pools::{AggregateConfig, ChartWindow, PoolError, PoolTracker};

fn read_rows(path: &std::path::Path) -> Vec<csv::StringRecord> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    rdr.records().map(|r| r.unwrap()).collect()
}

// ---------------------------------------------------------------------------
// Raw history → aggregate table
// ---------------------------------------------------------------------------

#[test]
fn two_day_history_produces_the_expected_aggregate_rows() {
    let dir = tempfile::tempdir().unwrap();
    let raw_table = dir.path().join("minepooldata.csv");
    let aggregate_table = dir.path().join("avgpooldata.csv");

    RawStore::new(&raw_table)
        .append_new(&[
            snapshot("1", "2024-01-01 08:00:00", &pool_field("Rare", "0.1")),
            snapshot("2", "2024-01-01 12:00:00", &pool_field("Rare", "0.2")),
            snapshot("3", "2024-01-01 16:00:00", &pool_field("Rare", "0.3")),
            snapshot("4", "2024-01-02 08:00:00", &pool_field("Rare", "0.9")),
        ])
        .unwrap();

    let cfg = AggregateConfig {
        raw_table,
        aggregate_table: aggregate_table.clone(),
        unit_suffix: " TLM".to_string(),
    };
    let report = aggregate::run(&cfg).unwrap();

    assert_eq!(report.total_rows, 4);
    assert_eq!(report.parsed_rows, 4);
    assert!(report.skipped.is_empty());
    assert_eq!(
        report.days,
        vec![("2024-01-01".to_string(), 3), ("2024-01-02".to_string(), 1)]
    );

    let rows = read_rows(&aggregate_table);
    assert_eq!(rows.len(), 2);

    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][1], "2024-01-01");
    assert!(rows[0][2].contains(r#""value":"0.2000 TLM""#));
    assert_eq!(&rows[0][3], "3");

    assert_eq!(&rows[1][0], "2");
    assert_eq!(&rows[1][1], "2024-01-02");
    assert!(rows[1][2].contains(r#""value":"0.9000 TLM""#));
    assert_eq!(&rows[1][3], "1");
}

#[test]
fn unparsable_rows_are_excluded_from_their_day() {
    let dir = tempfile::tempdir().unwrap();
    let raw_table = dir.path().join("minepooldata.csv");

    RawStore::new(&raw_table)
        .append_new(&[
            snapshot("1", "2024-01-01 08:00:00", &pool_field("Rare", "0.1")),
            snapshot("2", "2024-01-01 12:00:00", "{not valid}"),
            snapshot("3", "2024-01-01 16:00:00", &pool_field("Rare", "0.3")),
        ])
        .unwrap();

    let cfg = AggregateConfig {
        raw_table,
        aggregate_table: dir.path().join("avgpooldata.csv"),
        unit_suffix: " TLM".to_string(),
    };
    let report = aggregate::run(&cfg).unwrap();

    assert_eq!(report.total_rows, 3);
    assert_eq!(report.parsed_rows, 2);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].starts_with("2:"));

    // numberofentries counts only the rows that parsed; the mean of 0.1 and
    // 0.3 is 0.2.
    let rows = read_rows(&cfg.aggregate_table);
    assert_eq!(&rows[0][3], "2");
    assert!(rows[0][2].contains(r#""value":"0.2000 TLM""#));
}

#[test]
fn day_with_no_parsable_rows_is_absent_from_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let raw_table = dir.path().join("minepooldata.csv");

    RawStore::new(&raw_table)
        .append_new(&[
            snapshot("1", "2024-01-01 08:00:00", &pool_field("Rare", "0.1")),
            snapshot("2", "2024-01-02 08:00:00", "garbage"),
        ])
        .unwrap();

    let cfg = AggregateConfig {
        raw_table,
        aggregate_table: dir.path().join("avgpooldata.csv"),
        unit_suffix: " TLM".to_string(),
    };
    aggregate::run(&cfg).unwrap();

    let rows = read_rows(&cfg.aggregate_table);
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][1], "2024-01-01");
}

#[test]
fn aggregating_an_empty_raw_table_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let raw_table = dir.path().join("minepooldata.csv");
    std::fs::write(&raw_table, "id,date,pool,raw_timestamp\n").unwrap();

    let cfg = AggregateConfig {
        raw_table,
        aggregate_table: dir.path().join("avgpooldata.csv"),
        unit_suffix: " TLM".to_string(),
    };
    assert!(matches!(
        aggregate::run(&cfg).unwrap_err(),
        PoolError::EmptyResult(_)
    ));
    assert!(!cfg.aggregate_table.exists());
}

#[test]
fn rerunning_aggregation_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let raw_table = dir.path().join("minepooldata.csv");

    RawStore::new(&raw_table)
        .append_new(&[
            snapshot("1", "2024-01-01 08:00:00", &pool_field("Rare", "0.1")),
            snapshot("2", "2024-01-02 08:00:00", &pool_field("Rare", "0.2")),
        ])
        .unwrap();

    let cfg = AggregateConfig {
        raw_table,
        aggregate_table: dir.path().join("avgpooldata.csv"),
        unit_suffix: " TLM".to_string(),
    };
    aggregate::run(&cfg).unwrap();
    let first = std::fs::read_to_string(&cfg.aggregate_table).unwrap();
    aggregate::run(&cfg).unwrap();
    assert_eq!(std::fs::read_to_string(&cfg.aggregate_table).unwrap(), first);
}

// ---------------------------------------------------------------------------
// Tracker construction
// ---------------------------------------------------------------------------

#[test]
fn builder_derives_paths_from_the_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = PoolTracker::builder()
        .data_dir(dir.path())
        .limit(500)
        .windows(vec![ChartWindow::Full])
        .build()
        .unwrap();

    assert_eq!(
        tracker.ingest_config().raw_table,
        dir.path().join("minepooldata.csv")
    );
    assert_eq!(
        tracker.aggregate_config().aggregate_table,
        dir.path().join("avgpooldata.csv")
    );
    assert_eq!(
        tracker.chart_config().output_dir,
        dir.path().join("pool_plots")
    );
    assert_eq!(tracker.ingest_config().limit, 500);
    assert_eq!(tracker.chart_config().windows, vec![ChartWindow::Full]);

    let shown = tracker.to_string();
    assert!(shown.contains("hq.mu/minepooldata"));
}

#[test]
fn builder_overrides_individual_paths() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = PoolTracker::builder()
        .data_dir(dir.path())
        .raw_table(dir.path().join("custom_raw.csv"))
        .chart_dir(dir.path().join("charts"))
        .build()
        .unwrap();

    assert_eq!(
        tracker.ingest_config().raw_table,
        dir.path().join("custom_raw.csv")
    );
    assert_eq!(
        tracker.aggregate_config().raw_table,
        dir.path().join("custom_raw.csv")
    );
    assert_eq!(tracker.chart_config().output_dir, dir.path().join("charts"));
}
