use std::path::Path;

use chrono::{DateTime, Utc};

use crate::date_util::{days_between, parse_timestamp, Timestamp};
use crate::error::Result;
use crate::table::Table;

pub const ISSUE: &str = "Issue";
pub const CREATED_DATE: &str = "Created Date";
pub const RESOLUTION_DATE: &str = "Resolution Date";
pub const REPORTER: &str = "Reporter";

/// Columns every input table must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[ISSUE, CREATED_DATE, RESOLUTION_DATE, REPORTER];

/// Categorical columns that issues can be broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Realm,
    Workgroup,
    Specification,
    ProductFamily,
    IssueType,
}

impl Dimension {
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Realm => "Realm",
            Dimension::Workgroup => "WG Name",
            Dimension::Specification => "Specification Display Name",
            Dimension::ProductFamily => "Product Family",
            Dimension::IssueType => "Issue Type",
        }
    }

    /// Heading used in reports.
    pub fn title(&self) -> &'static str {
        match self {
            Dimension::Realm => "Realm",
            Dimension::Workgroup => "WG Name",
            Dimension::Specification => "Specification",
            Dimension::ProductFamily => "Product Family",
            Dimension::IssueType => "Issue Type",
        }
    }
}

/// One row of the input table.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    pub issue: String,
    pub created: Timestamp,
    pub resolved: Timestamp,
    pub reporter: Option<String>,
    pub realm: Option<String>,
    pub workgroup: Option<String>,
    pub specification: Option<String>,
    pub product_family: Option<String>,
    pub issue_type: Option<String>,
}

impl IssueRecord {
    pub fn new(issue: &str, created: &str, resolved: &str) -> Self {
        Self {
            issue: issue.to_string(),
            created: parse_timestamp(created),
            resolved: parse_timestamp(resolved),
            reporter: None,
            realm: None,
            workgroup: None,
            specification: None,
            product_family: product_family_of(issue),
            issue_type: None,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created.value()
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved.value()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at().is_some()
    }

    /// True when either date cell held text that could not be parsed.
    pub fn has_date_error(&self) -> bool {
        self.created == Timestamp::Invalid || self.resolved == Timestamp::Invalid
    }

    pub fn days_to_resolution(&self) -> Option<f64> {
        match (self.created_at(), self.resolved_at()) {
            (Some(c), Some(r)) => Some(days_between(c, r)),
            _ => None,
        }
    }

    pub fn value(&self, dim: Dimension) -> Option<&str> {
        match dim {
            Dimension::Realm => self.realm.as_deref(),
            Dimension::Workgroup => self.workgroup.as_deref(),
            Dimension::Specification => self.specification.as_deref(),
            Dimension::ProductFamily => self.product_family.as_deref(),
            Dimension::IssueType => self.issue_type.as_deref(),
        }
    }
}

/// The prefix of an issue key before its first hyphen ("FHIR-123" -> "FHIR").
pub fn product_family_of(issue: &str) -> Option<String> {
    let prefix = issue.trim().split('-').next().unwrap_or("").trim();
    (!prefix.is_empty()).then(|| prefix.to_string())
}

/// All issue records from one input table, plus what the table offered.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<IssueRecord>,
    dimensions: Vec<Dimension>,
    /// Records whose created or resolution date could not be parsed.
    pub date_errors: usize,
}

impl Dataset {
    /// Load a CSV export, normalising headers and checking required columns.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading data from {}", path.display());
        let table = Table::read_csv(path)?;
        Self::from_table(table)
    }

    pub fn from_table(mut table: Table) -> Result<Self> {
        table.apply_aliases();
        table.require(REQUIRED_COLUMNS)?;

        let mut dimensions = vec![Dimension::ProductFamily];
        for dim in [
            Dimension::Realm,
            Dimension::Workgroup,
            Dimension::Specification,
            Dimension::IssueType,
        ] {
            if table.has_column(dim.column()) {
                dimensions.push(dim);
            }
        }

        let col = |name: &str| table.column(name);
        let (issue_c, created_c, resolved_c, reporter_c) = (
            col(ISSUE),
            col(CREATED_DATE),
            col(RESOLUTION_DATE),
            col(REPORTER),
        );
        let realm_c = col(Dimension::Realm.column());
        let wg_c = col(Dimension::Workgroup.column());
        let spec_c = col(Dimension::Specification.column());
        let family_c = col(Dimension::ProductFamily.column());
        let type_c = col(Dimension::IssueType.column());

        let cell = |row: usize, c: Option<usize>| -> Option<String> {
            c.and_then(|c| table.get(row, c)).map(str::to_string)
        };

        let mut records = Vec::with_capacity(table.len());
        let mut date_errors = 0;
        for row in 0..table.len() {
            let issue = cell(row, issue_c).unwrap_or_default();
            let created = parse_timestamp(&cell(row, created_c).unwrap_or_default());
            let resolved = parse_timestamp(&cell(row, resolved_c).unwrap_or_default());
            let product_family = cell(row, family_c).or_else(|| product_family_of(&issue));

            let record = IssueRecord {
                created,
                resolved,
                reporter: cell(row, reporter_c),
                realm: cell(row, realm_c),
                workgroup: cell(row, wg_c),
                specification: cell(row, spec_c),
                product_family,
                issue_type: cell(row, type_c),
                issue,
            };
            if record.has_date_error() {
                log::debug!("Unparseable date on row {} ({})", row + 2, record.issue);
                date_errors += 1;
            }
            records.push(record);
        }

        if date_errors > 0 {
            log::warn!(
                "{date_errors} record(s) have unparseable dates; excluded from date-based metrics"
            );
        }

        Ok(Self {
            records,
            dimensions,
            date_errors,
        })
    }

    /// Build a dataset directly from records (all dimensions considered present).
    pub fn from_records(records: Vec<IssueRecord>) -> Self {
        let date_errors = records.iter().filter(|r| r.has_date_error()).count();
        Self {
            records,
            dimensions: vec![
                Dimension::Realm,
                Dimension::Workgroup,
                Dimension::Specification,
                Dimension::ProductFamily,
                Dimension::IssueType,
            ],
            date_errors,
        }
    }

    pub fn has(&self, dim: Dimension) -> bool {
        self.dimensions.contains(&dim)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn earliest_created(&self) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .filter_map(IssueRecord::created_at)
            .min()
    }

    pub fn latest_created(&self) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .filter_map(IssueRecord::created_at)
            .max()
    }

    /// Latest parseable timestamp of any kind in the data.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .flat_map(|r| [r.created_at(), r.resolved_at()])
            .flatten()
            .max()
    }
}
