use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::date_util::{long_date, trimester_of};
use crate::error::{Error, Result};

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})$").unwrap());
static RE_TRIMESTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})T([1-3])$").unwrap());
static RE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}(?:T[1-3])?)-(\d{4}(?:T[1-3])?)$").unwrap());

/// A reporting period: a calendar year, a trimester, or an inclusive span
/// from the start of one of those to the end of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    Trimester(i32, u8),
    Range(Box<Period>, Box<Period>),
}

impl Period {
    /// Parse a period token.
    ///
    /// Supported formats:
    /// - `2024` - calendar year
    /// - `2025T1` - trimester (T1 Jan–Apr, T2 May–Aug, T3 Sep–Dec)
    /// - `2023-2025T2`, `2024T2-2025T1` - range from the start of the first
    ///   token through the end of the second
    pub fn parse(s: &str) -> Result<Self> {
        let token = s.trim().to_uppercase();

        if let Some(caps) = RE_RANGE.captures(&token) {
            let start = Self::parse_single(&caps[1])
                .ok_or_else(|| Error::InvalidPeriodFormat(s.to_string()))?;
            let end = Self::parse_single(&caps[2])
                .ok_or_else(|| Error::InvalidPeriodFormat(s.to_string()))?;
            if start.start() > end.end() {
                return Err(Error::InvalidPeriodFormat(format!(
                    "{s} (range ends before it starts)"
                )));
            }
            return Ok(Period::Range(Box::new(start), Box::new(end)));
        }

        Self::parse_single(&token).ok_or_else(|| Error::InvalidPeriodFormat(s.to_string()))
    }

    fn parse_single(token: &str) -> Option<Self> {
        if let Some(caps) = RE_YEAR.captures(token) {
            return caps[1].parse().ok().map(Period::Year);
        }
        if let Some(caps) = RE_TRIMESTER.captures(token) {
            let year: i32 = caps[1].parse().ok()?;
            let t: u8 = caps[2].parse().ok()?;
            return Some(Period::Trimester(year, t));
        }
        None
    }

    /// Parse every token, failing on the first malformed one.
    pub fn parse_all<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Self>> {
        tokens.iter().map(|t| Self::parse(t.as_ref())).collect()
    }

    /// Canonical label, e.g. `2024`, `2024T2`, `2024T2-2025T1`.
    pub fn label(&self) -> String {
        match self {
            Period::Year(y) => format!("{y}"),
            Period::Trimester(y, t) => format!("{y}T{t}"),
            Period::Range(a, b) => format!("{}-{}", a.label(), b.label()),
        }
    }

    /// Inclusive date range covered by this period.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Year(y) => (date(*y, 1, 1), date(*y, 12, 31)),
            Period::Trimester(y, t) => match t {
                1 => (date(*y, 1, 1), date(*y, 4, 30)),
                2 => (date(*y, 5, 1), date(*y, 8, 31)),
                _ => (date(*y, 9, 1), date(*y, 12, 31)),
            },
            Period::Range(a, b) => (a.start(), b.end()),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.date_range().0
    }

    pub fn end(&self) -> NaiveDate {
        self.date_range().1
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        let (start, end) = self.date_range();
        d >= start && d <= end
    }

    /// All trimesters that overlap this period, in chronological order.
    pub fn trimesters(&self) -> Vec<Period> {
        let (start, end) = self.date_range();
        let mut out = Vec::new();
        for year in start.year()..=end.year() {
            let first = if year == start.year() {
                trimester_of(start)
            } else {
                1
            };
            let last = if year == end.year() {
                trimester_of(end)
            } else {
                3
            };
            for t in first..=last {
                out.push(Period::Trimester(year, t));
            }
        }
        out
    }

    /// "January 01, 2024 to December 31, 2024"
    pub fn describe(&self) -> String {
        let (start, end) = self.date_range();
        format!("{} to {}", long_date(start), long_date(end))
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// Years are at most four digits, which chrono always represents.
fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

/// Sort periods chronologically by start date, then by end date.
pub fn sort_chronologically(periods: &mut [Period]) {
    periods.sort_by_key(|p| p.date_range());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(Period::parse("2024").unwrap(), Period::Year(2024));
        assert_eq!(Period::parse(" 2024 ").unwrap(), Period::Year(2024));
    }

    #[test]
    fn test_parse_trimester() {
        assert_eq!(Period::parse("2025T1").unwrap(), Period::Trimester(2025, 1));
        assert_eq!(Period::parse("2025t3").unwrap(), Period::Trimester(2025, 3));
    }

    #[test]
    fn test_parse_range() {
        let p = Period::parse("2024T2-2025T1").unwrap();
        assert_eq!(
            p,
            Period::Range(
                Box::new(Period::Trimester(2024, 2)),
                Box::new(Period::Trimester(2025, 1))
            )
        );
        assert_eq!(p.date_range(), (ymd(2024, 5, 1), ymd(2025, 4, 30)));

        let p = Period::parse("2023-2025T2").unwrap();
        assert_eq!(p.date_range(), (ymd(2023, 1, 1), ymd(2025, 8, 31)));
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["24T1", "2025T4", "2025T0", "2025-Q1", "garbage", "", "20245"] {
            match Period::parse(bad) {
                Err(Error::InvalidPeriodFormat(_)) => {}
                other => panic!("expected InvalidPeriodFormat for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_backwards_range() {
        assert!(matches!(
            Period::parse("2025-2024"),
            Err(Error::InvalidPeriodFormat(_))
        ));
    }

    #[test]
    fn test_parse_all_stops_on_bad_token() {
        assert!(Period::parse_all(&["2024", "2025T1"]).is_ok());
        assert!(Period::parse_all(&["2024", "24T1"]).is_err());
    }

    #[test]
    fn test_label() {
        assert_eq!(Period::Year(2024).label(), "2024");
        assert_eq!(Period::Trimester(2024, 2).label(), "2024T2");
        assert_eq!(Period::parse("2024t2-2025").unwrap().label(), "2024T2-2025");
    }

    #[test]
    fn test_year_range() {
        for y in [1999, 2023, 2024, 2100] {
            assert_eq!(Period::Year(y).date_range(), (ymd(y, 1, 1), ymd(y, 12, 31)));
        }
    }

    #[test]
    fn test_trimesters_tile_the_year() {
        for y in [2023, 2024] {
            let t1 = Period::Trimester(y, 1).date_range();
            let t2 = Period::Trimester(y, 2).date_range();
            let t3 = Period::Trimester(y, 3).date_range();
            assert_eq!(t1.0, ymd(y, 1, 1));
            assert_eq!(t1.1 + Duration::days(1), t2.0);
            assert_eq!(t2.1 + Duration::days(1), t3.0);
            assert_eq!(t3.1, ymd(y, 12, 31));
            assert!(t1.0 <= t1.1 && t2.0 <= t2.1 && t3.0 <= t3.1);
        }
    }

    #[test]
    fn test_trimesters_within_period() {
        let labels = |p: &str| {
            Period::parse(p)
                .unwrap()
                .trimesters()
                .iter()
                .map(Period::label)
                .collect::<Vec<_>>()
        };
        assert_eq!(labels("2024"), vec!["2024T1", "2024T2", "2024T3"]);
        assert_eq!(labels("2025T2"), vec!["2025T2"]);
        assert_eq!(labels("2024T3-2025T1"), vec!["2024T3", "2025T1"]);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let p = Period::Trimester(2024, 1);
        assert!(p.contains(ymd(2024, 1, 1)));
        assert!(p.contains(ymd(2024, 4, 30)));
        assert!(!p.contains(ymd(2024, 5, 1)));
        assert!(!p.contains(ymd(2023, 12, 31)));
    }

    #[test]
    fn test_sort_chronologically() {
        let mut periods = Period::parse_all(&["2025T1", "2024", "2023-2024", "2024T3"]).unwrap();
        sort_chronologically(&mut periods);
        let labels: Vec<String> = periods.iter().map(Period::label).collect();
        assert_eq!(labels, vec!["2023-2024", "2024", "2024T3", "2025T1"]);
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            Period::Trimester(2024, 1).describe(),
            "January 01, 2024 to April 30, 2024"
        );
    }
}
