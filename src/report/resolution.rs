use std::path::Path;

use super::{days, percent, MarkdownDoc, MdTable};
use crate::classify::Classified;
use crate::date_util::long_date;
use crate::error::{Error, Result};
use crate::issue::{Dataset, Dimension};
use crate::metrics::reporters::{analyze_reporters, RankedReporter, LEADERBOARD_SIZE};
use crate::metrics::{
    aggregate, band_label, overall_summary, period_summary, subperiod_breakdown,
    workgroup_realm_shares, AggregateRow, GroupKey, PerformanceBand,
};
use crate::period::Period;
use crate::staff::StaffList;

pub const REPORT_TITLE: &str = "Issue Resolution Summary Report";

const METRIC_HEADERS: [&str; 7] = [
    "New",
    "Resolved",
    "Backlog",
    "Ave (days)",
    "Median (days)",
    "P80 (days)",
    "Performance",
];

/// Everything the resolution report needs. `periods` keeps the order the
/// user gave; the first one is the primary period.
pub struct ResolutionReport<'a> {
    dataset: &'a Dataset,
    periods: Vec<Period>,
    staff: &'a StaffList,
}

impl<'a> ResolutionReport<'a> {
    pub fn new(dataset: &'a Dataset, periods: &[Period], staff: &'a StaffList) -> Self {
        let mut unique: Vec<Period> = Vec::with_capacity(periods.len());
        for p in periods {
            if !unique.contains(p) {
                unique.push(p.clone());
            }
        }
        Self {
            dataset,
            periods: unique,
            staff,
        }
    }

    pub fn render(&self) -> String {
        let classified = Classified::new(self.dataset, &self.periods);
        let mut doc = MarkdownDoc::new(REPORT_TITLE);

        if let Some(primary) = self.periods.first() {
            doc.preamble(&format!("> **Analysis Period:** {}", primary.describe()));
        }

        self.how_to_read(&mut doc);
        self.overall(&mut doc);
        self.period_summaries(&mut doc, &classified);
        self.reporters(&mut doc);

        if self.dataset.has(Dimension::IssueType) {
            self.issue_types(&mut doc, &classified);
        } else {
            log::info!("No Issue Type column; skipping issue type breakdown");
        }

        self.breakdown(&mut doc, &classified, Dimension::Realm);
        if self.dataset.has(Dimension::Workgroup) && self.dataset.has(Dimension::Realm) {
            self.workgroup_realm(&mut doc);
        } else {
            log::info!("No WG Name or Realm column; skipping WG Name and Realm breakdown");
        }
        self.breakdown(&mut doc, &classified, Dimension::Workgroup);
        self.breakdown(&mut doc, &classified, Dimension::Specification);
        self.breakdown(&mut doc, &classified, Dimension::ProductFamily);

        doc.render(true)
    }

    fn how_to_read(&self, doc: &mut MarkdownDoc) {
        doc.section("How to Read This Report");
        doc.subsection("Key Metrics");
        doc.line("- **New:** Issues created during the specified time period");
        doc.line(
            "- **Resolved:** Issues with a resolution date during the specified time period. \
             The resolution date in Jira is assigned when an issue is given a (proposed) \
             disposition, which is not necessarily when the change is applied to the \
             specification.",
        );
        doc.line(
            "- **Backlog:** Issues created at any time before the end of the specified period \
             that remain unresolved at the end of that period",
        );
        doc.line("- **Ave (days):** Average time to resolution for issues resolved in this period");
        doc.line(
            "- **Median (days):** Median time to resolution \
             (50% of issues resolved faster than this)",
        );
        doc.line(
            "- **P80 (days):** 80th percentile resolution time \
             (80% of issues resolved faster than this)",
        );
        doc.blank();

        doc.subsection("Time Periods");
        doc.line("Periods are defined as:");
        doc.line("- **T1:** January, February, March, April");
        doc.line("- **T2:** May, June, July, August");
        doc.line("- **T3:** September, October, November, December");
        doc.blank();

        doc.subsection("Performance Bands");
        let mut bands = MdTable::new(["Band", "P80 Range (days)", "Interpretation"]);
        for band in PerformanceBand::ALL {
            bands.row(vec![
                format!("**{band}**"),
                band.range().to_string(),
                band.interpretation().to_string(),
            ]);
        }
        doc.table(&bands);
        doc.paragraph(
            "_Note: the band labels borrow the musical vocabulary for tempo. \
             See the [Tempo article on Wikipedia](https://en.wikipedia.org/wiki/Tempo)._",
        );
    }

    fn overall(&self, doc: &mut MarkdownDoc) {
        let summary = overall_summary(self.dataset);
        doc.section("Overall Summary");
        if let (Some(first), Some(last)) = (summary.earliest_created, summary.latest_created) {
            doc.paragraph(&format!(
                "This summary includes all issues in the dataset from **{} to {}**.",
                long_date(first.date_naive()),
                long_date(last.date_naive())
            ));
        }
        doc.line(&format!("- **Total Issues:** {}", summary.total));
        doc.line(&format!("- **Resolved Issues:** {}", summary.resolved));
        doc.line(&format!("- **Current Backlog (Unresolved):** {}", summary.backlog));
        doc.line(&format!(
            "- **Ave Resolution Time (days):** {}",
            days(summary.resolution.mean_days)
        ));
        doc.line(&format!(
            "- **Median Resolution Time (days):** {}",
            days(summary.resolution.median_days)
        ));
        doc.line(&format!(
            "- **P80 Resolution Time (days):** {}",
            days(summary.resolution.p80_days)
        ));
        doc.line(&format!("- **Performance Band:** {}", band_label(summary.band)));
        if summary.date_errors > 0 {
            doc.line(&format!(
                "- **Records with Unparseable Dates:** {} (excluded from date-based metrics)",
                summary.date_errors
            ));
        }
        doc.blank();
    }

    fn period_summaries(&self, doc: &mut MarkdownDoc, classified: &Classified<'_>) {
        doc.section("Summary by Analysis Period");
        let mut table = metric_table(&["Period"]);
        for row in period_summary(classified) {
            table.row(with_metrics(vec![row.period_label.clone()], &row));
        }
        doc.table(&table);

        for period in &self.periods {
            doc.section(&format!("Breakdown by Period within {}", period.label()));
            doc.paragraph(&format!("This breakdown covers **{}**.", period.describe()));
            let mut table = metric_table(&["Period"]);
            for row in subperiod_breakdown(self.dataset, period) {
                table.row(with_metrics(vec![row.period_label.clone()], &row));
            }
            doc.table(&table);
        }
    }

    fn reporters(&self, doc: &mut MarkdownDoc) {
        doc.section("Issue Reporters");
        doc.subsection("Reporter Summary");
        let mut summary = MdTable::new([
            "Period",
            "Total Reporters",
            "New Reporters",
            "% New Reporters",
            "Reporters Through Period End",
        ]);
        for period in &self.periods {
            let a = analyze_reporters(self.dataset, period, self.staff, LEADERBOARD_SIZE);
            summary.row(vec![
                a.summary.period_label,
                a.summary.active_in_period.to_string(),
                a.summary.new_in_period.to_string(),
                percent(a.summary.new_pct),
                a.summary.total_through_end.to_string(),
            ]);
        }
        doc.table(&summary);

        let Some(primary) = self.periods.first() else {
            return;
        };
        let a = analyze_reporters(self.dataset, primary, self.staff, LEADERBOARD_SIZE);
        doc.subsection(&format!("Top Reporters for {}", primary.label()));
        doc.table(&leaderboard(&a.top_in_period));
        doc.subsection(&format!("Top Reporters (Through {})", long_date(primary.end())));
        doc.table(&leaderboard(&a.top_through_end));
    }

    fn issue_types(&self, doc: &mut MarkdownDoc, classified: &Classified<'_>) {
        doc.section("Breakdown by Issue Type");
        let rows = aggregate(classified, GroupKey::By(Dimension::IssueType));
        for period in &self.periods {
            let label = period.label();
            let mut in_period: Vec<&AggregateRow> =
                rows.iter().filter(|r| r.period_label == label).collect();
            if in_period.is_empty() {
                continue;
            }
            in_period.sort_by(|a, b| b.counts.new.cmp(&a.counts.new));

            doc.subsection(&format!("Issue Types for {label}"));
            let mut table = metric_table(&["Issue Type"]);
            for row in in_period {
                table.row(with_metrics(vec![row.group.clone()], row));
            }
            doc.table(&table);
        }
    }

    fn workgroup_realm(&self, doc: &mut MarkdownDoc) {
        doc.section("Breakdown by WG Name and Realm");
        let mut table = MdTable::new(["WG Name", "Realm", "Total Issues", "% within WG"]);
        for share in workgroup_realm_shares(self.dataset) {
            table.row(vec![
                share.workgroup,
                share.realm,
                share.total_issues.to_string(),
                percent(share.pct_within_workgroup),
            ]);
        }
        doc.table(&table);
    }

    fn breakdown(&self, doc: &mut MarkdownDoc, classified: &Classified<'_>, dim: Dimension) {
        if !self.dataset.has(dim) {
            log::info!("No {} column; skipping its breakdown", dim.column());
            return;
        }
        doc.section(&format!("Breakdown by {}", dim.title()));

        if dim == Dimension::Specification {
            let mut table = metric_table(&[dim.column(), "Realm", "Period"]);
            for row in aggregate(classified, GroupKey::SpecificationRealm) {
                if row.counts.is_idle() {
                    continue;
                }
                let realm = row.subgroup.clone().unwrap_or_default();
                table.row(with_metrics(
                    vec![row.group.clone(), realm, row.period_label.clone()],
                    &row,
                ));
            }
            doc.table(&table);
            return;
        }

        let mut table = metric_table(&[dim.column(), "Period"]);
        for row in aggregate(classified, GroupKey::By(dim)) {
            table.row(with_metrics(
                vec![row.group.clone(), row.period_label.clone()],
                &row,
            ));
        }
        doc.table(&table);
    }
}

/// Render the full resolution analysis as markdown.
pub fn render_resolution_report(
    dataset: &Dataset,
    periods: &[Period],
    staff: &StaffList,
) -> String {
    ResolutionReport::new(dataset, periods, staff).render()
}

/// What an `analyze` run covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub issues: usize,
    pub date_errors: usize,
    pub periods: Vec<String>,
}

/// Load `input`, render the resolution report for `tokens` and write it to
/// `output`. Period tokens are validated before the input is opened.
pub fn analyze_file<S: AsRef<str>>(
    input: &Path,
    output: &Path,
    tokens: &[S],
    staff_config: &Path,
) -> Result<AnalysisSummary> {
    let periods = Period::parse_all(tokens)?;
    let staff = StaffList::load_or_empty(staff_config);
    let dataset = Dataset::load(input)?;

    let text = render_resolution_report(&dataset, &periods, &staff);
    std::fs::write(output, text).map_err(|e| Error::io(output, e))?;
    log::info!("Report written to {}", output.display());

    Ok(AnalysisSummary {
        issues: dataset.len(),
        date_errors: dataset.date_errors,
        periods: periods.iter().map(Period::label).collect(),
    })
}

fn metric_table(leading: &[&str]) -> MdTable {
    MdTable::new(leading.iter().chain(METRIC_HEADERS.iter()).copied())
}

fn with_metrics(mut cells: Vec<String>, row: &AggregateRow) -> Vec<String> {
    cells.extend([
        row.counts.new.to_string(),
        row.counts.resolved.to_string(),
        row.counts.backlog.to_string(),
        days(row.resolution.mean_days),
        days(row.resolution.median_days),
        days(row.resolution.p80_days),
        band_label(row.band),
    ]);
    cells
}

fn leaderboard(ranked: &[RankedReporter]) -> MdTable {
    let mut table = MdTable::new(["Rank", "Reporter", "Issue Count"]);
    for r in ranked {
        table.row(vec![
            r.rank.to_string(),
            r.reporter.clone(),
            r.issue_count.to_string(),
        ]);
    }
    table
}
