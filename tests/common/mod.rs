//! Shared fixtures for the tlm-pools integration tests.

#![allow(dead_code)]

use tlm_pools::store::RawSnapshot;

/// Build a raw snapshot whose stored `date` and `raw_timestamp` are the same.
pub fn snapshot(id: &str, date: &str, pool: &str) -> RawSnapshot {
    RawSnapshot {
        id: id.to_string(),
        date: date.to_string(),
        pool: pool.to_string(),
        raw_timestamp: date.to_string(),
    }
}

/// A pool field with a single tier entry, e.g. `pool_field("Rare", "0.5000")`.
pub fn pool_field(key: &str, amount: &str) -> String {
    format!(r#"[{{"key":"{key}","value":"{amount} TLM"}}]"#)
}
