use crate::issue::{Dataset, IssueRecord};
use crate::period::Period;

/// Membership of one record in one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodFlags {
    /// `created_in_<label>`
    pub created_in: bool,
    /// `resolved_in_<label>`
    pub resolved_in: bool,
    /// `backlog_at_<label>_end`
    pub backlog_at_end: bool,
}

/// Classify a record against a period.
///
/// Dates are compared by their UTC calendar day, so both period bounds are
/// inclusive. A record with an unparseable date gets no flags at all; one
/// with no created date likewise.
pub fn classify(record: &IssueRecord, period: &Period) -> PeriodFlags {
    if record.has_date_error() {
        return PeriodFlags::default();
    }
    let Some(created) = record.created_at().map(|t| t.date_naive()) else {
        return PeriodFlags::default();
    };
    let resolved = record.resolved_at().map(|t| t.date_naive());
    let (_, end) = period.date_range();

    PeriodFlags {
        created_in: period.contains(created),
        resolved_in: resolved.is_some_and(|d| period.contains(d)),
        backlog_at_end: created <= end && resolved.is_none_or(|d| d > end),
    }
}

/// A dataset with flags attached for every requested period.
///
/// Periods are held in chronological order regardless of the order they
/// were requested in.
#[derive(Debug)]
pub struct Classified<'a> {
    dataset: &'a Dataset,
    periods: Vec<Period>,
    // flags[record][period]
    flags: Vec<Vec<PeriodFlags>>,
}

impl<'a> Classified<'a> {
    pub fn new(dataset: &'a Dataset, periods: &[Period]) -> Self {
        let mut periods = periods.to_vec();
        crate::period::sort_chronologically(&mut periods);
        periods.dedup();

        let flags = dataset
            .records
            .iter()
            .map(|r| periods.iter().map(|p| classify(r, p)).collect())
            .collect();

        Self {
            dataset,
            periods,
            flags,
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn flags(&self, record: usize, period: usize) -> PeriodFlags {
        self.flags
            .get(record)
            .and_then(|row| row.get(period))
            .copied()
            .unwrap_or_default()
    }
}
