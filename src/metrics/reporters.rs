use std::collections::{HashMap, HashSet};

use crate::issue::Dataset;
use crate::period::Period;
use crate::staff::StaffList;

/// Number of reporters shown in each leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;

/// Reporter activity for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterSummary {
    pub period_label: String,
    /// Distinct reporters from the start of the data through the period end.
    pub total_through_end: usize,
    /// Distinct reporters who filed an issue during the period.
    pub active_in_period: usize,
    /// Active reporters with no issue filed before the period started.
    pub new_in_period: usize,
    pub new_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedReporter {
    pub rank: usize,
    pub reporter: String,
    pub issue_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReporterAnalysis {
    pub summary: ReporterSummary,
    pub top_in_period: Vec<RankedReporter>,
    pub top_through_end: Vec<RankedReporter>,
}

/// Analyse reporters for `period`. Staff are left out of the rankings but
/// still count toward the summary figures.
pub fn analyze_reporters(
    dataset: &Dataset,
    period: &Period,
    staff: &StaffList,
    limit: usize,
) -> ReporterAnalysis {
    let (start, end) = period.date_range();

    let mut before: HashSet<&str> = HashSet::new();
    let mut through_end: Vec<&str> = Vec::new();
    let mut in_period: Vec<&str> = Vec::new();

    for record in &dataset.records {
        let (Some(reporter), Some(created)) = (record.reporter.as_deref(), record.created_at())
        else {
            continue;
        };
        let day = created.date_naive();
        if day < start {
            before.insert(reporter);
        }
        if day <= end {
            through_end.push(reporter);
        }
        if period.contains(day) {
            in_period.push(reporter);
        }
    }

    let total_through_end = through_end.iter().collect::<HashSet<_>>().len();
    let active: HashSet<&str> = in_period.iter().copied().collect();
    let new_in_period = active.iter().filter(|r| !before.contains(*r)).count();
    let new_pct = if active.is_empty() {
        0.0
    } else {
        new_in_period as f64 / active.len() as f64 * 100.0
    };

    ReporterAnalysis {
        summary: ReporterSummary {
            period_label: period.label(),
            total_through_end,
            active_in_period: active.len(),
            new_in_period,
            new_pct,
        },
        top_in_period: rank(&in_period, staff, limit),
        top_through_end: rank(&through_end, staff, limit),
    }
}

/// Rank reporters by issue count, descending. Ties keep the order in which
/// reporters first appear in the data.
fn rank(reporters: &[&str], staff: &StaffList, limit: usize) -> Vec<RankedReporter> {
    let mut order: HashMap<&str, usize> = HashMap::new();
    let mut tallies: Vec<(&str, u64)> = Vec::new();
    for &reporter in reporters.iter().filter(|r| !staff.contains(r)) {
        match order.get(reporter) {
            Some(&i) => tallies[i].1 += 1,
            None => {
                order.insert(reporter, tallies.len());
                tallies.push((reporter, 1));
            }
        }
    }
    tallies.sort_by(|a, b| b.1.cmp(&a.1));

    tallies
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (reporter, issue_count))| RankedReporter {
            rank: i + 1,
            reporter: reporter.to_string(),
            issue_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueRecord;

    fn rec(reporter: &str, created: &str) -> IssueRecord {
        let mut r = IssueRecord::new("FHIR-1", created, "");
        r.reporter = Some(reporter.to_string());
        r
    }

    fn names(ranked: &[RankedReporter]) -> Vec<(&str, u64)> {
        ranked
            .iter()
            .map(|r| (r.reporter.as_str(), r.issue_count))
            .collect()
    }

    fn sample() -> Dataset {
        Dataset::from_records(vec![
            rec("alice", "2023-06-01"),
            rec("alice", "2023-07-01"),
            rec("staffer", "2023-08-01"),
            rec("alice", "2024-02-01"),
            rec("bob", "2024-02-02"),
            rec("staffer", "2024-02-03"),
            rec("staffer", "2024-02-04"),
            rec("staffer", "2024-02-05"),
            rec("carol", "2024-03-01"),
            rec("carol", "2024-03-02"),
            rec("dave", "2024-09-01"),
        ])
    }

    #[test]
    fn test_summary_counts() {
        let ds = sample();
        let t1 = Period::parse("2024T1").unwrap();
        let a = analyze_reporters(&ds, &t1, &StaffList::default(), 10);
        assert_eq!(a.summary.total_through_end, 4); // alice, staffer, bob, carol
        assert_eq!(a.summary.active_in_period, 4);
        assert_eq!(a.summary.new_in_period, 2); // bob, carol
        assert_eq!(a.summary.new_pct, 50.0);
    }

    #[test]
    fn test_staff_excluded_even_when_top() {
        let ds = sample();
        let staff = StaffList::from_names(["staffer"]);
        let a = analyze_reporters(&ds, &Period::parse("2024T1").unwrap(), &staff, 10);

        assert_eq!(
            names(&a.top_in_period),
            vec![("carol", 2), ("alice", 1), ("bob", 1)]
        );
        assert_eq!(
            names(&a.top_through_end),
            vec![("alice", 3), ("carol", 2), ("bob", 1)]
        );
        assert!(a.top_in_period.iter().all(|r| r.reporter != "staffer"));
        // Staff still count as active reporters.
        assert_eq!(a.summary.active_in_period, 4);
    }

    #[test]
    fn test_ranks_are_sequential_and_limited() {
        let ds = sample();
        let a = analyze_reporters(&ds, &Period::Year(2024), &StaffList::default(), 2);
        assert_eq!(a.top_in_period.len(), 2);
        assert_eq!(a.top_in_period[0].rank, 1);
        assert_eq!(a.top_in_period[0].reporter, "staffer");
        assert_eq!(a.top_in_period[1].rank, 2);
    }

    #[test]
    fn test_ties_keep_first_appearance_order() {
        let ds = Dataset::from_records(vec![
            rec("zed", "2024-01-01"),
            rec("amy", "2024-01-02"),
            rec("amy", "2024-01-03"),
            rec("zed", "2024-01-04"),
        ]);
        let a = analyze_reporters(&ds, &Period::Year(2024), &StaffList::default(), 10);
        assert_eq!(names(&a.top_in_period), vec![("zed", 2), ("amy", 2)]);
    }

    #[test]
    fn test_empty_period() {
        let ds = sample();
        let a = analyze_reporters(&ds, &Period::Year(2030), &StaffList::default(), 10);
        assert_eq!(a.summary.active_in_period, 0);
        assert_eq!(a.summary.new_pct, 0.0);
        assert!(a.top_in_period.is_empty());
        assert_eq!(a.summary.total_through_end, 5);
    }
}
