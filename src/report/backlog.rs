use std::path::Path;

use super::{percent, MarkdownDoc, MdTable};
use crate::date_util::parse_as_of;
use crate::error::{Error, Result};
use crate::issue::Dataset;
use crate::metrics::backlog::{analyze_backlog, reference_instant, BacklogAging};

pub const REPORT_TITLE: &str = "Backlog Age Analysis Report";

/// Product families listed in the breakdown table.
const TOP_FAMILIES: usize = 10;

pub fn render_backlog_report(aging: &BacklogAging) -> String {
    let mut doc = MarkdownDoc::new(REPORT_TITLE);
    doc.preamble(&format!(
        "> **Ages measured as of:** {}",
        aging.reference.format("%Y-%m-%d %H:%M UTC")
    ));

    let Some(overall) = aging.overall.as_ref() else {
        doc.paragraph("No unresolved issues found in the dataset.");
        return doc.render(false);
    };
    let total = overall.count;

    doc.section("Overall Backlog Statistics");
    doc.line(&format!("- **Total unresolved issues:** {total}"));
    doc.line(&format!("- **Mean age:** {:.1} days", overall.mean_age));
    doc.line(&format!("- **Median age:** {:.1} days", overall.median_age));
    doc.line(&format!("- **P90 age:** {:.1} days", overall.p90_age));
    doc.line(&format!("- **Maximum age:** {:.1} days", overall.max_age));
    doc.line(&format!(
        "- **Staleness Index:** {:.1} (Category: {})",
        overall.staleness_index,
        overall.category()
    ));
    doc.blank();

    doc.section("Age Distribution");
    let mut dist = MdTable::new(["Age", "Issues", "Share"]);
    for bucket in &aging.buckets {
        dist.row(vec![
            bucket.label.to_string(),
            bucket.count.to_string(),
            percent(bucket.count as f64 / total as f64 * 100.0),
        ]);
    }
    doc.table(&dist);

    doc.section("Product Family Breakdown");
    doc.paragraph(&format!(
        "Top {TOP_FAMILIES} product families by backlog count:"
    ));
    let mut families = MdTable::new([
        "Product Family",
        "Count",
        "Mean Age",
        "Median Age",
        "P90 Age",
        "Staleness",
    ]);
    for family in aging.by_family.iter().take(TOP_FAMILIES) {
        let s = &family.stats;
        families.row(vec![
            family.product_family.clone(),
            s.count.to_string(),
            format!("{:.1}", s.mean_age),
            format!("{:.1}", s.median_age),
            format!("{:.1}", s.p90_age),
            format!("{:.1}", s.staleness_index),
        ]);
    }
    doc.table(&families);

    doc.section("Risk Assessment");
    let risks = risk_lines(aging);
    if risks.is_empty() {
        doc.line("No significant aging risks detected.");
    }
    for risk in risks {
        doc.line(&format!("- ⚠️ {risk}"));
    }
    doc.blank();

    doc.render(true)
}

/// Load `input`, age its open issues and write the backlog report to
/// `output`. A malformed `as_of` date fails before the input is opened.
pub fn backlog_file(input: &Path, output: &Path, as_of: Option<&str>) -> Result<BacklogAging> {
    let as_of = as_of.map(parse_as_of).transpose()?;
    let dataset = Dataset::load(input)?;
    let aging = analyze_backlog(&dataset, reference_instant(&dataset, as_of));

    let text = render_backlog_report(&aging);
    std::fs::write(output, text).map_err(|e| Error::io(output, e))?;
    log::info!("Backlog report written to {}", output.display());
    Ok(aging)
}

fn risk_lines(aging: &BacklogAging) -> Vec<String> {
    let mut out = Vec::new();
    let Some(overall) = aging.overall.as_ref() else {
        return out;
    };

    if overall.p90_age > 180.0 {
        out.push("HIGH RISK: 10% of backlog issues are older than 6 months".to_string());
    } else if overall.p90_age > 90.0 {
        out.push("MEDIUM RISK: 10% of backlog issues are older than 3 months".to_string());
    }

    let old = aging.over_a_year();
    if old > 0 {
        out.push(format!(
            "{old} issues ({}) have been open for more than a year",
            percent(old as f64 / overall.count as f64 * 100.0)
        ));
    }

    if overall.category().is_concerning() {
        out.push(format!(
            "Backlog Staleness Index ({:.1}) indicates significant aging issues",
            overall.staleness_index
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueRecord;
    use chrono::{TimeZone, Utc};

    fn aging(records: Vec<IssueRecord>) -> BacklogAging {
        let reference = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        analyze_backlog(&Dataset::from_records(records), reference)
    }

    #[test]
    fn test_empty_backlog_message() {
        let text = render_backlog_report(&aging(vec![IssueRecord::new(
            "FHIR-1",
            "2024-01-01",
            "2024-01-05",
        )]));
        assert!(text.starts_with("# Backlog Age Analysis Report"));
        assert!(text.contains("No unresolved issues found in the dataset."));
        assert!(!text.contains("## Overall Backlog Statistics"));
    }

    #[test]
    fn test_healthy_backlog() {
        let text = render_backlog_report(&aging(vec![
            IssueRecord::new("FHIR-1", "2024-12-30", ""),
            IssueRecord::new("FHIR-2", "2024-12-28", ""),
        ]));
        assert!(text.contains("- **Total unresolved issues:** 2"));
        assert!(text.contains("- **Mean age:** 3.0 days"));
        assert!(text.contains("(Category: Healthy)"));
        assert!(text.contains("| 0-7 days | 2 | 100.0% |"));
        assert!(text.contains("| FHIR | 2 | 3.0 | 3.0 |"));
        assert!(text.contains("No significant aging risks detected."));
    }

    #[test]
    fn test_old_backlog_raises_risks() {
        let text = render_backlog_report(&aging(vec![
            IssueRecord::new("FHIR-1", "2023-01-01", ""),
            IssueRecord::new("CDA-1", "2024-12-25", ""),
        ]));
        assert!(text.contains("HIGH RISK"));
        assert!(text.contains("1 issues (50.0%) have been open for more than a year"));
        assert!(text.contains("(Category: Critical)"));
        assert!(text.contains("indicates significant aging issues"));
        assert!(text.contains("- [Risk Assessment](#risk-assessment)"));
    }

    #[test]
    fn test_backlog_file_uses_as_of() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("issues.csv");
        let output = dir.path().join("backlog.md");
        std::fs::write(
            &input,
            "Issue,Created Date,Resolution Date,Reporter\n\
             FHIR-1,2024-12-01,,alice\n\
             FHIR-2,2024-06-01,2024-07-01,bob\n",
        )
        .unwrap();

        let aging = backlog_file(&input, &output, Some("2025-01-01")).unwrap();
        assert_eq!(
            aging.reference,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(aging.backlog_count(), 1);
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("> **Ages measured as of:** 2025-01-01 00:00 UTC"));
        assert!(text.contains("- **Mean age:** 31.0 days"));
    }

    #[test]
    fn test_bad_as_of_fails_before_input_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("backlog.md");
        let result = backlog_file(&dir.path().join("missing.csv"), &output, Some("next week"));
        assert!(matches!(result, Err(Error::InvalidDate(_))));
        assert!(!output.exists());
    }
}
