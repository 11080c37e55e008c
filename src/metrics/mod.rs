pub mod backlog;
pub mod band;
pub mod reporters;
pub mod types;

use std::collections::BTreeMap;

pub use band::{band_label, PerformanceBand};
pub use types::*;

use crate::classify::Classified;
use crate::issue::{Dataset, Dimension, IssueRecord};
use crate::period::Period;

/// Label used for records whose realm is blank in paired breakdowns.
pub const UNKNOWN: &str = "Unknown";

/// How records are grouped for a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// One group holding every record.
    All,
    By(Dimension),
    /// Workgroup, then realm within the workgroup.
    WorkgroupRealm,
    /// Specification, then realm within the specification.
    SpecificationRealm,
}

impl GroupKey {
    fn of(&self, record: &IssueRecord) -> Option<(String, Option<String>)> {
        let realm = || {
            Some(
                record
                    .value(Dimension::Realm)
                    .unwrap_or(UNKNOWN)
                    .to_string(),
            )
        };
        match self {
            GroupKey::All => Some((String::new(), None)),
            GroupKey::By(dim) => record.value(*dim).map(|v| (v.to_string(), None)),
            GroupKey::WorkgroupRealm => record
                .value(Dimension::Workgroup)
                .map(|wg| (wg.to_string(), realm())),
            GroupKey::SpecificationRealm => record
                .value(Dimension::Specification)
                .map(|spec| (spec.to_string(), realm())),
        }
    }
}

/// Produce one row per (group, period), ordered by group label, then
/// sub-group, then the period's start date.
///
/// Records lacking the grouping value are left out.
pub fn aggregate(classified: &Classified<'_>, key: GroupKey) -> Vec<AggregateRow> {
    let records = &classified.dataset().records;

    let mut groups: BTreeMap<(String, Option<String>), Vec<usize>> = BTreeMap::new();
    for (idx, record) in records.iter().enumerate() {
        if let Some(k) = key.of(record) {
            groups.entry(k).or_default().push(idx);
        }
    }

    let mut rows = Vec::with_capacity(groups.len() * classified.periods().len());
    for ((group, subgroup), members) in groups {
        for (pidx, period) in classified.periods().iter().enumerate() {
            let (counts, resolution) = summarize(classified, &members, pidx);
            rows.push(AggregateRow {
                group: group.clone(),
                subgroup: subgroup.clone(),
                period_label: period.label(),
                period_start: period.start(),
                counts,
                band: resolution.band(),
                resolution,
            });
        }
    }
    rows
}

fn summarize(
    classified: &Classified<'_>,
    members: &[usize],
    period_idx: usize,
) -> (PeriodCounts, ResolutionStats) {
    let records = &classified.dataset().records;
    let mut counts = PeriodCounts::default();
    let mut days = Vec::new();

    for &idx in members {
        let flags = classified.flags(idx, period_idx);
        counts.new += u64::from(flags.created_in);
        counts.backlog += u64::from(flags.backlog_at_end);
        if flags.resolved_in {
            counts.resolved += 1;
            if let Some(d) = records[idx].days_to_resolution() {
                days.push(d);
            }
        }
    }
    (counts, resolution_stats(&days))
}

/// One row per requested period across all records.
pub fn period_summary(classified: &Classified<'_>) -> Vec<AggregateRow> {
    aggregate(classified, GroupKey::All)
}

/// One row per trimester within `period`.
pub fn subperiod_breakdown(dataset: &Dataset, period: &Period) -> Vec<AggregateRow> {
    let classified = Classified::new(dataset, &period.trimesters());
    aggregate(&classified, GroupKey::All)
}

/// Totals over the whole dataset.
pub fn overall_summary(dataset: &Dataset) -> OverallSummary {
    let total = dataset.len() as u64;
    let resolved = dataset.records.iter().filter(|r| r.is_resolved()).count() as u64;
    let days: Vec<f64> = dataset
        .records
        .iter()
        .filter_map(IssueRecord::days_to_resolution)
        .collect();
    let resolution = resolution_stats(&days);

    OverallSummary {
        total,
        resolved,
        backlog: total - resolved,
        band: resolution.band(),
        resolution,
        earliest_created: dataset.earliest_created(),
        latest_created: dataset.latest_created(),
        date_errors: dataset.date_errors,
    }
}

/// Issue counts per (workgroup, realm), each as a share of its workgroup.
///
/// Ordered by workgroup, then by count descending, then realm.
pub fn workgroup_realm_shares(dataset: &Dataset) -> Vec<WorkgroupRealmShare> {
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    let mut wg_totals: BTreeMap<String, u64> = BTreeMap::new();

    for record in &dataset.records {
        let Some((wg, Some(realm))) = GroupKey::WorkgroupRealm.of(record) else {
            continue;
        };
        *wg_totals.entry(wg.clone()).or_default() += 1;
        *counts.entry((wg, realm)).or_default() += 1;
    }

    let mut shares: Vec<WorkgroupRealmShare> = counts
        .into_iter()
        .map(|((workgroup, realm), total_issues)| {
            let wg_total = wg_totals.get(&workgroup).copied().unwrap_or(total_issues);
            WorkgroupRealmShare {
                pct_within_workgroup: total_issues as f64 / wg_total as f64 * 100.0,
                workgroup,
                realm,
                total_issues,
            }
        })
        .collect();

    shares.sort_by(|a, b| {
        a.workgroup
            .cmp(&b.workgroup)
            .then(b.total_issues.cmp(&a.total_issues))
            .then(a.realm.cmp(&b.realm))
    });
    shares
}

/// Mean, median and P80 of a set of day counts. Empty input yields all `None`.
pub fn resolution_stats(days: &[f64]) -> ResolutionStats {
    let mut sorted: Vec<f64> = days.iter().copied().filter(|d| !d.is_nan()).collect();
    if sorted.is_empty() {
        return ResolutionStats::default();
    }
    sorted.sort_by(f64::total_cmp);

    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    ResolutionStats {
        count: sorted.len(),
        mean_days: Some(mean),
        median_days: quantile(&sorted, 0.5),
        p80_days: quantile(&sorted, 0.8),
    }
}

/// Quantile of sorted data with linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
