//! Parsing of the opaque pool-bucket field into tier-key amounts.
//!
//! The field is a JSON array of `{key, value}` objects where `value` is a
//! string like `"0.1083 TLM"`. Historic rows written by earlier collectors
//! carry single-quoted pseudo-JSON, so a failed strict decode is retried once
//! with single quotes substituted.

use std::collections::BTreeMap;

use log::{debug, warn};
use rust_decimal::Decimal;
use serde_json::Value;

// ---------------------------------------------------------------------------
// PoolParse
// ---------------------------------------------------------------------------

/// Outcome of parsing one pool-bucket field.
///
/// `Parsed` always carries at least one entry; a field from which nothing
/// survives reports `Failed` so the record can be excluded from its day's
/// averaging.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolParse {
    Parsed(BTreeMap<String, Decimal>),
    Failed(String),
}

impl PoolParse {
    pub fn is_parsed(&self) -> bool {
        matches!(self, PoolParse::Parsed(_))
    }

    /// The parsed entries, or an empty map for a failed parse.
    pub fn entries(self) -> BTreeMap<String, Decimal> {
        match self {
            PoolParse::Parsed(entries) => entries,
            PoolParse::Failed(_) => BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one raw pool-bucket field into a tier-key → amount mapping.
///
/// `unit_suffix` (e.g. `" TLM"`) is stripped from each value before numeric
/// conversion. A failure on one entry does not discard the entries already
/// parsed from the same field; it is logged and skipped. Amounts are kept as
/// [`Decimal`] so rounding happens only at emission, never during
/// accumulation.
pub fn parse_pool_field(raw: &str, unit_suffix: &str) -> PoolParse {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return PoolParse::Failed("empty pool field".to_string());
    }

    // Outer quotes sometimes survive a round-trip through the raw store.
    let clean = trimmed.trim_matches(|c| c == '"' || c == '\'');

    let items = match decode_literal(clean) {
        Ok(items) => items,
        Err(reason) => return PoolParse::Failed(reason),
    };

    let mut entries = BTreeMap::new();
    for item in &items {
        let Some(obj) = item.as_object() else {
            debug!("skipping non-object pool entry: {item}");
            continue;
        };
        let (Some(key), Some(value)) = (obj.get("key").and_then(Value::as_str), obj.get("value"))
        else {
            debug!("skipping pool entry without key/value fields: {item}");
            continue;
        };

        let value_repr = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let amount_str = value_repr.replace(unit_suffix, "");
        match amount_str.trim().parse::<Decimal>() {
            Ok(amount) => {
                entries.insert(key.to_string(), amount);
            }
            Err(_) => {
                warn!("could not convert value '{}' for key '{}'", amount_str.trim(), key);
            }
        }
    }

    if entries.is_empty() {
        PoolParse::Failed("no parsable entries in pool field".to_string())
    } else {
        PoolParse::Parsed(entries)
    }
}

/// Decode the field as a JSON array, retrying once with single quotes
/// replaced for legacy rows.
fn decode_literal(clean: &str) -> std::result::Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(clean) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(format!("pool field is not a list: {other}")),
        Err(first_err) => match serde_json::from_str::<Value>(&clean.replace('\'', "\"")) {
            Ok(Value::Array(items)) => Ok(items),
            _ => Err(format!("malformed pool literal: {first_err}")),
        },
    }
}
