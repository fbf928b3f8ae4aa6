//! Tests for response-row validation and conversion (no network involved).

use serde_json::json;
use tlm_pools::fetch::{snapshot_from_row, INVALID_TIMESTAMP};

#[test]
fn complete_row_converts_to_snapshot() {
    let row = json!({
        "snapshot_id": 42,
        "snapshot_date": "2024-01-05T10:00:00.500",
        "pool_buckets": [{"key": "Rare", "value": "0.5000 TLM"}]
    });

    let snap = snapshot_from_row(&row).unwrap();
    assert_eq!(snap.id, "42");
    assert_eq!(snap.date, "2024-01-05 10:00:00");
    assert_eq!(snap.raw_timestamp, "2024-01-05T10:00:00.500");
    // The json-form pool field is re-serialized into one string column.
    assert_eq!(snap.pool, r#"[{"key":"Rare","value":"0.5000 TLM"}]"#);
}

#[test]
fn string_pool_field_is_stored_verbatim() {
    let row = json!({
        "snapshot_id": "7",
        "snapshot_date": "2024-01-05 10:00:00",
        "pool_buckets": "[{\"key\":\"Rare\",\"value\":\"0.5 TLM\"}]"
    });

    let snap = snapshot_from_row(&row).unwrap();
    assert_eq!(snap.id, "7");
    assert_eq!(snap.pool, "[{\"key\":\"Rare\",\"value\":\"0.5 TLM\"}]");
}

#[test]
fn missing_required_field_rejects_the_row() {
    let row = json!({
        "snapshot_id": 1,
        "pool_buckets": []
    });
    let reason = snapshot_from_row(&row).unwrap_err();
    assert!(reason.contains("snapshot_date"));
}

#[test]
fn non_object_row_is_rejected() {
    assert!(snapshot_from_row(&json!([1, 2, 3])).is_err());
    assert!(snapshot_from_row(&json!("row")).is_err());
}

#[test]
fn bad_timestamp_gets_the_sentinel_but_keeps_the_raw_value() {
    let row = json!({
        "snapshot_id": 1,
        "snapshot_date": "whenever",
        "pool_buckets": []
    });

    let snap = snapshot_from_row(&row).unwrap();
    assert_eq!(snap.date, INVALID_TIMESTAMP);
    assert_eq!(snap.raw_timestamp, "whenever");
}

#[test]
fn non_string_timestamp_gets_the_sentinel() {
    let row = json!({
        "snapshot_id": 1,
        "snapshot_date": null,
        "pool_buckets": []
    });

    let snap = snapshot_from_row(&row).unwrap();
    assert_eq!(snap.date, INVALID_TIMESTAMP);
    assert_eq!(snap.raw_timestamp, "null");
}
