//! Calendar-day extraction from raw snapshot timestamps.
//!
//! This is the lenient normalizer used by aggregation: it never fails, and
//! unparseable input passes through unchanged so a bad timestamp costs at most
//! one odd bucket, never the whole batch. The strict ingestion-time variant
//! lives in [`fetch::canonical_timestamp`](crate::fetch::canonical_timestamp).

/// Return the date portion of a timestamp string.
///
/// Handles both `"2024-01-05T10:00:00"` and `"2024-01-05 10:00:00"` forms by
/// taking the substring before the separator. Input without a recognizable
/// separator is returned unchanged.
pub fn day_of(raw: &str) -> String {
    if let Some((day, _)) = raw.split_once('T') {
        day.to_string()
    } else if let Some((day, _)) = raw.split_once(' ') {
        day.to_string()
    } else {
        raw.to_string()
    }
}
