use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::quantile;
use crate::date_util::days_between;
use crate::issue::Dataset;

/// Upper bounds (inclusive, in days) of the age buckets, with their labels.
/// Anything older than the last bound lands in the overflow bucket.
const AGE_BUCKETS: &[(f64, &str)] = &[
    (7.0, "0-7 days"),
    (30.0, "8-30 days"),
    (90.0, "31-90 days"),
    (180.0, "91-180 days"),
    (365.0, "181-365 days"),
];
const OVERFLOW_BUCKET: &str = "Over 365 days";

/// Coarse health rating of a backlog derived from its staleness index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StalenessCategory {
    Healthy,
    Moderate,
    Stale,
    Critical,
}

impl StalenessCategory {
    pub fn for_index(index: f64) -> Self {
        if index < 10.0 {
            StalenessCategory::Healthy
        } else if index < 50.0 {
            StalenessCategory::Moderate
        } else if index < 100.0 {
            StalenessCategory::Stale
        } else {
            StalenessCategory::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StalenessCategory::Healthy => "Healthy",
            StalenessCategory::Moderate => "Moderate",
            StalenessCategory::Stale => "Stale",
            StalenessCategory::Critical => "Critical",
        }
    }

    pub fn is_concerning(&self) -> bool {
        matches!(self, StalenessCategory::Stale | StalenessCategory::Critical)
    }
}

impl std::fmt::Display for StalenessCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Age statistics for a set of open issues.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeStats {
    pub count: usize,
    pub mean_age: f64,
    pub median_age: f64,
    pub p90_age: f64,
    pub max_age: f64,
    pub staleness_index: f64,
}

impl AgeStats {
    /// `None` for an empty set.
    pub fn from_ages(ages: &[f64]) -> Option<Self> {
        let mut sorted = ages.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let last = *sorted.last()?;
        Some(Self {
            count,
            mean_age: sorted.iter().sum::<f64>() / count as f64,
            median_age: quantile(&sorted, 0.5).unwrap_or(last),
            p90_age: quantile(&sorted, 0.9).unwrap_or(last),
            max_age: last,
            staleness_index: sorted.iter().map(|a| staleness_score(*a)).sum::<f64>()
                / count as f64,
        })
    }

    pub fn category(&self) -> StalenessCategory {
        StalenessCategory::for_index(self.staleness_index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgeBucket {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyBacklog {
    pub product_family: String,
    pub stats: AgeStats,
}

/// Age analysis of every unresolved issue relative to `reference`.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklogAging {
    pub reference: DateTime<Utc>,
    /// `None` when nothing is open.
    pub overall: Option<AgeStats>,
    pub buckets: Vec<AgeBucket>,
    /// Ordered by backlog size, largest first.
    pub by_family: Vec<FamilyBacklog>,
}

impl BacklogAging {
    pub fn backlog_count(&self) -> usize {
        self.overall.as_ref().map_or(0, |s| s.count)
    }

    pub fn bucket(&self, label: &str) -> usize {
        self.buckets
            .iter()
            .find(|b| b.label == label)
            .map_or(0, |b| b.count)
    }

    /// Issues open for more than a year.
    pub fn over_a_year(&self) -> usize {
        self.bucket(OVERFLOW_BUCKET)
    }
}

/// Points accrued by an issue that has been open `age` days. The rate per day
/// rises with age, so a few very old issues outweigh many fresh ones.
pub fn staleness_score(age: f64) -> f64 {
    if age.is_nan() {
        0.0
    } else if age <= 7.0 {
        0.1 * age
    } else if age <= 30.0 {
        0.7 + 0.2 * (age - 7.0)
    } else if age <= 90.0 {
        5.3 + 0.5 * (age - 30.0)
    } else if age <= 180.0 {
        35.3 + (age - 90.0)
    } else {
        125.3 + 2.0 * (age - 180.0)
    }
}

fn bucket_label(age: f64) -> &'static str {
    AGE_BUCKETS
        .iter()
        .find(|(bound, _)| age <= *bound)
        .map_or(OVERFLOW_BUCKET, |(_, label)| *label)
}

/// Reference instant for aging: the explicit value, else the latest timestamp
/// in the data, else now.
pub fn reference_instant(dataset: &Dataset, as_of: Option<DateTime<Utc>>) -> DateTime<Utc> {
    as_of
        .or_else(|| dataset.latest_timestamp())
        .unwrap_or_else(Utc::now)
}

pub fn analyze_backlog(dataset: &Dataset, reference: DateTime<Utc>) -> BacklogAging {
    let mut ages = Vec::new();
    let mut families: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for record in dataset
        .records
        .iter()
        .filter(|r| !r.is_resolved() && !r.has_date_error())
    {
        let Some(created) = record.created_at() else {
            continue;
        };
        let age = days_between(created, reference);
        ages.push(age);
        families
            .entry(record.product_family.as_deref().unwrap_or(super::UNKNOWN))
            .or_default()
            .push(age);
    }
    log::debug!("{} open issues aged against {reference}", ages.len());

    let mut buckets: Vec<AgeBucket> = AGE_BUCKETS
        .iter()
        .map(|(_, label)| *label)
        .chain([OVERFLOW_BUCKET])
        .map(|label| AgeBucket { label, count: 0 })
        .collect();
    for age in &ages {
        let label = bucket_label(*age);
        if let Some(b) = buckets.iter_mut().find(|b| b.label == label) {
            b.count += 1;
        }
    }

    let mut by_family: Vec<FamilyBacklog> = families
        .into_iter()
        .filter_map(|(family, ages)| {
            AgeStats::from_ages(&ages).map(|stats| FamilyBacklog {
                product_family: family.to_string(),
                stats,
            })
        })
        .collect();
    // BTreeMap order already sorts names, so a stable sort keeps them as the tie-break.
    by_family.sort_by(|a, b| b.stats.count.cmp(&a.stats.count));

    BacklogAging {
        reference,
        overall: AgeStats::from_ages(&ages),
        buckets,
        by_family,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueRecord;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_staleness_score_is_continuous() {
        assert_eq!(staleness_score(0.0), 0.0);
        for bound in [7.0, 30.0, 90.0, 180.0] {
            let below = staleness_score(bound);
            let above = staleness_score(bound + 1e-9);
            assert!((below - above).abs() < 1e-6, "jump at {bound}");
        }
        assert!(close(staleness_score(7.0), 0.7));
        assert!(close(staleness_score(30.0), 5.3));
        assert!(close(staleness_score(90.0), 35.3));
        assert!(close(staleness_score(180.0), 125.3));
        assert!(close(staleness_score(200.0), 165.3));
        assert_eq!(staleness_score(f64::NAN), 0.0);
    }

    #[test]
    fn test_category_thresholds() {
        assert_eq!(
            StalenessCategory::for_index(9.99),
            StalenessCategory::Healthy
        );
        assert_eq!(
            StalenessCategory::for_index(10.0),
            StalenessCategory::Moderate
        );
        assert_eq!(StalenessCategory::for_index(50.0), StalenessCategory::Stale);
        assert_eq!(
            StalenessCategory::for_index(100.0),
            StalenessCategory::Critical
        );
        assert!(!StalenessCategory::Moderate.is_concerning());
        assert!(StalenessCategory::Stale.is_concerning());
    }

    #[test]
    fn test_bucket_edges() {
        assert_eq!(bucket_label(0.0), "0-7 days");
        assert_eq!(bucket_label(7.0), "0-7 days");
        assert_eq!(bucket_label(7.5), "8-30 days");
        assert_eq!(bucket_label(365.0), "181-365 days");
        assert_eq!(bucket_label(365.5), "Over 365 days");
    }

    #[test]
    fn test_analyze_backlog() {
        let ds = Dataset::from_records(vec![
            IssueRecord::new("FHIR-1", "2024-12-27", ""),
            IssueRecord::new("FHIR-2", "2024-11-01", ""),
            IssueRecord::new("FHIR-3", "2023-01-01", ""),
            IssueRecord::new("CDA-1", "2024-10-03", ""),
            IssueRecord::new("CDA-2", "2024-01-01", "2024-02-01"),
            IssueRecord::new("V2-1", "garbage", ""),
            IssueRecord::new("V2-2", "2024-12-01", "soon"),
        ]);
        let aging = analyze_backlog(&ds, at(2025, 1, 1));

        let overall = aging.overall.as_ref().unwrap();
        assert_eq!(overall.count, 4);
        assert_eq!(overall.max_age, 731.0);
        assert_eq!(aging.bucket("0-7 days"), 1);
        assert_eq!(aging.bucket("31-90 days"), 2);
        assert_eq!(aging.over_a_year(), 1);
        assert_eq!(aging.buckets.iter().map(|b| b.count).sum::<usize>(), 4);

        let families: Vec<(&str, usize)> = aging
            .by_family
            .iter()
            .map(|f| (f.product_family.as_str(), f.stats.count))
            .collect();
        assert_eq!(families, vec![("FHIR", 3), ("CDA", 1)]);
    }

    #[test]
    fn test_family_ties_sort_by_name() {
        let ds = Dataset::from_records(vec![
            IssueRecord::new("V2-1", "2024-12-01", ""),
            IssueRecord::new("CDA-1", "2024-12-01", ""),
        ]);
        let aging = analyze_backlog(&ds, at(2025, 1, 1));
        assert_eq!(aging.by_family[0].product_family, "CDA");
        assert_eq!(aging.by_family[1].product_family, "V2");
    }

    #[test]
    fn test_empty_backlog() {
        let resolved = IssueRecord::new("FHIR-1", "2024-01-01", "2024-01-02");
        let ds = Dataset::from_records(vec![resolved]);
        let aging = analyze_backlog(&ds, at(2025, 1, 1));
        assert!(aging.overall.is_none());
        assert_eq!(aging.backlog_count(), 0);
        assert!(aging.by_family.is_empty());
    }

    #[test]
    fn test_reference_instant_prefers_explicit_then_data() {
        let resolved = IssueRecord::new("FHIR-1", "2024-01-01", "2024-03-01");
        let ds = Dataset::from_records(vec![resolved]);
        assert_eq!(reference_instant(&ds, Some(at(2030, 1, 1))), at(2030, 1, 1));
        assert_eq!(reference_instant(&ds, None), at(2024, 3, 1));
    }
}
