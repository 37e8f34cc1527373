use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Serial day counts below this are spreadsheet-style days; anything larger is an epoch.
const SERIAL_DAY_LIMIT: f64 = 100_000.0;
/// Epoch values at or above this are milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Spreadsheet day zero (serial 1 is 1899-12-31, serial 60 is the phantom 1900-02-29 that
/// counting from 1899-12-30 absorbs for every date after February 1900).
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Parse any supported date encoding carried by a raw JSON scalar.
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n.as_f64().and_then(parse_date_number),
        _ => None,
    }
}

/// Parse a textual date: ISO-8601 dates and datetimes, RFC 3339, US `MM/DD/YYYY`,
/// or a numeric string (serial day count or epoch).
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        // Compact YYYYMMDD reads as a calendar date, not as a count.
        if s.len() == 8 && s.starts_with(|c: char| c == '1' || c == '2') {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
                return Some(d);
            }
        }
        return s.parse::<f64>().ok().and_then(parse_date_number);
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    // Offset-bearing timestamps keep the calendar date as written at the source.
    let iso = s.replace('Z', "+00:00");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&iso) {
        return Some(dt.date_naive());
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&iso, fmt) {
            return Some(dt.date_naive());
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    // Last resort: a leading YYYY-MM-DD followed by anything.
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Interpret a bare number as serial days, epoch seconds or epoch milliseconds.
pub fn parse_date_number(n: f64) -> Option<NaiveDate> {
    if !n.is_finite() || n <= 0.0 {
        return None;
    }
    if n < SERIAL_DAY_LIMIT {
        return serial_epoch().checked_add_signed(Duration::days(n.floor() as i64));
    }
    let secs = if n >= EPOCH_MILLIS_THRESHOLD {
        (n / 1000.0).floor() as i64
    } else {
        n.floor() as i64
    };
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}
