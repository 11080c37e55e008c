use chrono::{DateTime, NaiveDate, Utc};

use super::band::PerformanceBand;

/// New / resolved / backlog counts for one group in one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodCounts {
    pub new: u64,
    pub resolved: u64,
    pub backlog: u64,
}

impl PeriodCounts {
    pub fn is_idle(&self) -> bool {
        self.new == 0 && self.resolved == 0 && self.backlog == 0
    }
}

/// Resolution-time statistics over issues resolved in a period.
/// All fields are `None` when no issue qualifies.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolutionStats {
    pub count: usize,
    pub mean_days: Option<f64>,
    pub median_days: Option<f64>,
    pub p80_days: Option<f64>,
}

impl ResolutionStats {
    pub fn band(&self) -> Option<PerformanceBand> {
        PerformanceBand::for_p80(self.p80_days)
    }
}

/// One row of a breakdown: a group value (and optional sub-group) in a period.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub group: String,
    pub subgroup: Option<String>,
    pub period_label: String,
    pub period_start: NaiveDate,
    pub counts: PeriodCounts,
    pub resolution: ResolutionStats,
    pub band: Option<PerformanceBand>,
}

/// Whole-dataset totals, independent of any period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverallSummary {
    pub total: u64,
    pub resolved: u64,
    /// Unresolved issues as of the end of the data.
    pub backlog: u64,
    pub resolution: ResolutionStats,
    pub band: Option<PerformanceBand>,
    pub earliest_created: Option<DateTime<Utc>>,
    pub latest_created: Option<DateTime<Utc>>,
    pub date_errors: usize,
}

/// Issue count for a (workgroup, realm) pair and its share of the workgroup.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkgroupRealmShare {
    pub workgroup: String,
    pub realm: String,
    pub total_issues: u64,
    /// Percentage of the workgroup's issues, not of the grand total.
    pub pct_within_workgroup: f64,
}
