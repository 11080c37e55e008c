use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Get the trimester (1-3) for a given date. T1 is Jan-Apr, T2 May-Aug, T3 Sep-Dec.
pub fn trimester_of(d: NaiveDate) -> u8 {
    ((d.month() - 1) / 4 + 1) as u8
}

/// Outcome of parsing a nullable timestamp cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Missing,
    Invalid,
    At(DateTime<Utc>),
}

impl Timestamp {
    pub fn value(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::At(t) => Some(*t),
            _ => None,
        }
    }
}

/// Parse an ISO-8601-ish timestamp as found in JIRA exports.
///
/// Accepts `Z`, `+00:00`, `+0000` style offsets as well as no offset at all
/// (read as UTC), with or without fractional seconds, and bare dates.
pub fn parse_timestamp(s: &str) -> Timestamp {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Timestamp::Missing;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Timestamp::At(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Timestamp::At(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Timestamp::At(ndt.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = d.and_hms_opt(0, 0, 0) {
            return Timestamp::At(ndt.and_utc());
        }
    }
    Timestamp::Invalid
}

/// Parse a user-supplied reference date such as `--as-of 2025-01-01`.
pub fn parse_as_of(s: &str) -> Result<DateTime<Utc>> {
    match parse_timestamp(s) {
        Timestamp::At(t) => Ok(t),
        _ => Err(Error::InvalidDate(s.to_string())),
    }
}

/// Fractional days between two instants.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// "January 05, 2024"
pub fn long_date(d: NaiveDate) -> String {
    d.format("%B %d, %Y").to_string()
}

/// "YYYY-MM" bucket for a timestamp.
pub fn month_key(t: DateTime<Utc>) -> String {
    format!("{}-{:02}", t.year(), t.month())
}
