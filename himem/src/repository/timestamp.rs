//! Timestamp encoding for TEXT columns.
//!
//! Timestamps are UTC, truncated to microseconds and written in a fixed
//! width RFC 3339 form (`2026-01-02T03:04:05.123456Z`), so lexical order in
//! SQL equals chronological order and values survive a round trip exactly.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::error::StoreError;

/// Current time at storage precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn encode(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode(table: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            reason: format!("bad timestamp '{}': {}", raw, e),
        })
}
