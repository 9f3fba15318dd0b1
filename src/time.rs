//! Date/duration helpers shared across the lot engine and reporting layers.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The original source marks a purchase date as "Various Dates" (used when a
/// consolidated lot spans multiple purchase days) by setting its microsecond
/// field to this reserved value. Rust's `DateTime` only exposes nanosecond
/// resolution, so the marker lives in the low-order microsecond slot.
const VARIOUS_DATES_MICROSECOND: u32 = 123_456;

/// Returns `true` if `date` carries the "Various Dates" sentinel.
pub fn is_various_dates(date: DateTime<Utc>) -> bool {
    (date.timestamp_subsec_nanos() / 1_000) % 1_000_000 == VARIOUS_DATES_MICROSECOND
}

/// Builds a sentinel date that formats as "Various Dates".
pub fn various_dates_marker() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap()
        .and_hms_micro_opt(0, 0, 0, VARIOUS_DATES_MICROSECOND)
        .unwrap()
        .and_utc()
}

/// Date kinds recognized by the two report schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `YYYY/MM/DD`, used by the sales report.
    SalesReport,
    /// `MM/DD/YYYY`, used by IRS Form 8949.
    Irs8949,
}

/// Formats `date` per `style`, substituting the "Various Dates" sentinel.
pub fn format_date(date: DateTime<Utc>, style: DateStyle) -> String {
    if is_various_dates(date) {
        return "Various Dates".to_owned();
    }
    match style {
        DateStyle::SalesReport => date.format("%Y/%m/%d").to_string(),
        DateStyle::Irs8949 => date.format("%m/%d/%Y").to_string(),
    }
}

/// Formats a holding-period-style duration as an ISO-8601 duration (`P#D`).
///
/// No crate in the dependency tree ships an ISO-8601 duration formatter, so
/// this one conversion (days-only, which is all a holding period needs) is
/// hand-written rather than pulled in as a one-off dependency.
pub fn format_duration_iso8601(duration: Duration) -> String {
    format!("P{}D", duration.num_days())
}

/// Parses an ISO-8601 `P#D` duration back into a `chrono::Duration`.
pub fn parse_duration_iso8601(s: &str) -> Option<Duration> {
    let days = s.strip_prefix('P')?.strip_suffix('D')?;
    days.parse::<i64>().ok().map(Duration::days)
}

pub fn serialize_date<S: Serializer>(
    date: &DateTime<Utc>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&date.to_rfc3339())
}

pub fn deserialize_date<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    let raw: String = Deserialize::deserialize(d)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

pub fn serialize_optional_date<S: Serializer>(
    date: &Option<DateTime<Utc>>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match date {
        Some(date) => s.serialize_str(&date.to_rfc3339()),
        None => s.serialize_str(""),
    }
}

pub fn deserialize_optional_date<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let raw: String = Deserialize::deserialize(d)?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(serde::de::Error::custom)
}
