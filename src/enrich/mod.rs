//! Offline enrichment of a raw JIRA issue export.

pub mod registry;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

pub use registry::{realm_from_url, SpecRegistry, UrlRealm, WorkgroupRegistry};

use crate::date_util::{days_between, month_key, parse_timestamp};
use crate::error::Result;
use crate::issue::{product_family_of, CREATED_DATE, ISSUE, RESOLUTION_DATE};
use crate::storage::RealmStore;
use crate::table::Table;

const SPECIFICATION: &str = "Specification";
const WG: &str = "WG";
const WG_NAME: &str = "WG Name";
const REALM: &str = "Realm";
const SPEC_DISPLAY_NAME: &str = "Specification Display Name";
const PRODUCT_FAMILY: &str = "Product Family";
const DAYS_TO_RESOLUTION: &str = "Days to Resolution";
const CREATION_MONTH: &str = "Creation Month";
const RESOLUTION_MONTH: &str = "Resolution Month";

/// Known data-entry mistakes in the tracker: (issue, column, corrected value).
const CORRECTIONS: &[(&str, &str, &str)] = &[
    ("V2-25638", SPECIFICATION, "V2-lri"),
    ("V2-15528", WG, "v2mg"),
];

/// What an enrichment run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceSummary {
    pub rows: usize,
    pub corrections: usize,
    pub display_names: usize,
    pub realms: usize,
    pub wg_names: usize,
    /// Mappings newly written to the realm store.
    pub mappings_saved: usize,
    /// Specifications that yielded no realm.
    pub unresolved_specs: Vec<String>,
    /// Product brief URLs with no stored realm.
    pub unresolved_urls: Vec<String>,
}

/// Default output path: `<stem>-enhanced.<ext>` beside the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "issues".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{stem}-enhanced.{}", ext.to_string_lossy()),
        None => format!("{stem}-enhanced"),
    };
    input.with_file_name(name)
}

/// Adds display names, realms, workgroup names and derived date columns to
/// an issue table, learning new realm mappings along the way.
pub struct Enricher<'a> {
    specs: &'a SpecRegistry,
    workgroups: Option<&'a WorkgroupRegistry>,
    store: &'a mut RealmStore,
    resolved: HashMap<String, Option<String>>,
    unresolved_urls: BTreeSet<String>,
}

impl<'a> Enricher<'a> {
    pub fn new(
        specs: &'a SpecRegistry,
        workgroups: Option<&'a WorkgroupRegistry>,
        store: &'a mut RealmStore,
    ) -> Self {
        Self {
            specs,
            workgroups,
            store,
            resolved: HashMap::new(),
            unresolved_urls: BTreeSet::new(),
        }
    }

    /// Enrich `table` in place and flush any realm mappings learned.
    pub fn enhance(&mut self, table: &mut Table) -> Result<EnhanceSummary> {
        let mut summary = EnhanceSummary {
            rows: table.len(),
            corrections: apply_corrections(table),
            ..Default::default()
        };

        let families = product_families(table);

        if let Some(spec_col) = table.column(SPECIFICATION) {
            let keys: Vec<Option<String>> = (0..table.len())
                .map(|row| table.get(row, spec_col).map(str::to_string))
                .collect();

            let names: Vec<Option<String>> = keys
                .iter()
                .zip(&families)
                .map(|(key, family)| {
                    let key = key.as_deref()?;
                    if key == "core" && family.as_deref() == Some("V2") {
                        return Some("V2 Core (V2)".to_string());
                    }
                    self.specs.display_name(key).map(str::to_string)
                })
                .collect();
            summary.display_names = names.iter().flatten().count();

            let existing = table.column(REALM);
            let mut realms = Vec::with_capacity(keys.len());
            for (row, key) in keys.iter().enumerate() {
                let resolved = key.as_deref().and_then(|k| self.resolve_realm(k));
                let kept = existing.and_then(|c| table.get(row, c)).map(str::to_string);
                realms.push(resolved.or(kept));
            }
            summary.realms = realms.iter().flatten().count();

            table.put_column(None, REALM, realms);
            table.put_column(None, SPEC_DISPLAY_NAME, names);
            log::info!(
                "Added specification display names for {} records and realms for {} records",
                summary.display_names,
                summary.realms
            );
        }

        if let (Some(wg_col), Some(workgroups)) = (table.column(WG), self.workgroups) {
            let names: Vec<Option<String>> = (0..table.len())
                .map(|row| {
                    table
                        .get(row, wg_col)
                        .and_then(|wg| workgroups.name(wg))
                        .map(str::to_string)
                })
                .collect();
            summary.wg_names = names.iter().flatten().count();
            table.put_column(Some(wg_col + 1), WG_NAME, names);
            log::info!("Added WG Name for {} records", summary.wg_names);
        }

        if !table.has_column(PRODUCT_FAMILY) {
            table.put_column(None, PRODUCT_FAMILY, families);
        }
        add_date_columns(table);

        summary.unresolved_specs = self
            .resolved
            .iter()
            .filter(|(_, realm)| realm.is_none())
            .map(|(spec, _)| spec.clone())
            .collect();
        summary.unresolved_specs.sort();
        summary.unresolved_urls = self.unresolved_urls.iter().cloned().collect();
        if !summary.unresolved_specs.is_empty() {
            log::warn!(
                "The following specifications did not yield a realm: {}",
                summary.unresolved_specs.join(", ")
            );
        }
        for url in &summary.unresolved_urls {
            log::warn!("No stored realm for product brief {url}");
        }

        summary.mappings_saved = self.store.flush()?;
        Ok(summary)
    }

    /// Realm for a specification key: the store first, then the key's URL.
    fn resolve_realm(&mut self, spec_key: &str) -> Option<String> {
        if let Some(cached) = self.resolved.get(spec_key) {
            return cached.clone();
        }
        let realm = self.lookup_realm(spec_key);
        self.resolved.insert(spec_key.to_string(), realm.clone());
        realm
    }

    fn lookup_realm(&mut self, spec_key: &str) -> Option<String> {
        if let Some(realm) = self.store.lookup_spec(spec_key) {
            log::debug!("Using stored realm for spec '{spec_key}'");
            return Some(realm.to_string());
        }
        let url = self.specs.url(spec_key)?;
        let realm = match realm_from_url(url) {
            UrlRealm::Known(realm) => {
                log::debug!("Inferred realm '{realm}' for {url}");
                realm.to_string()
            }
            UrlRealm::ProductBrief => match self.store.lookup_url(url) {
                Some(realm) => realm.to_string(),
                None => {
                    self.unresolved_urls.insert(url.to_string());
                    return None;
                }
            },
            UrlRealm::Unrecognised => return None,
        };
        self.store.record_spec(spec_key, Some(url), &realm);
        Some(realm)
    }
}

/// Enrich a CSV file and write the result.
pub fn enhance_file(
    input: &Path,
    output: &Path,
    specs: &SpecRegistry,
    workgroups: Option<&WorkgroupRegistry>,
    store: &mut RealmStore,
) -> Result<EnhanceSummary> {
    log::info!("Loading data from {}", input.display());
    let mut table = Table::read_csv(input)?;
    let summary = Enricher::new(specs, workgroups, store).enhance(&mut table)?;
    log::info!("Writing enhanced data to {}", output.display());
    table.write_csv(output)?;
    Ok(summary)
}

fn apply_corrections(table: &mut Table) -> usize {
    let Some(issue_col) = table.column(ISSUE) else {
        return 0;
    };
    let mut applied = 0;
    for (issue, column, value) in CORRECTIONS {
        let Some(col) = table.column(column) else {
            continue;
        };
        for row in 0..table.len() {
            if table.get(row, issue_col) == Some(*issue) {
                table.set(row, col, *value);
                log::info!("Applied correction: {column} = '{value}' for issue {issue}");
                applied += 1;
            }
        }
    }
    applied
}

fn product_families(table: &Table) -> Vec<Option<String>> {
    let family_col = table.column(PRODUCT_FAMILY);
    let issue_col = table.column(ISSUE);
    (0..table.len())
        .map(|row| match family_col {
            Some(c) => table.get(row, c).map(str::to_string),
            None => issue_col
                .and_then(|c| table.get(row, c))
                .and_then(product_family_of),
        })
        .collect()
}

fn add_date_columns(table: &mut Table) {
    let (Some(created_col), Some(resolved_col)) =
        (table.column(CREATED_DATE), table.column(RESOLUTION_DATE))
    else {
        log::warn!("Date columns missing; skipping derived date columns");
        return;
    };

    let mut days = Vec::with_capacity(table.len());
    let mut created_months = Vec::with_capacity(table.len());
    let mut resolved_months = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let created = parse_timestamp(table.get(row, created_col).unwrap_or_default()).value();
        let resolved = parse_timestamp(table.get(row, resolved_col).unwrap_or_default()).value();
        days.push(match (created, resolved) {
            (Some(c), Some(r)) => Some(registry::round_sig3(days_between(c, r)).to_string()),
            _ => None,
        });
        created_months.push(created.map(month_key));
        resolved_months.push(resolved.map(month_key));
    }

    table.put_column(None, DAYS_TO_RESOLUTION, days);
    table.put_column(None, CREATION_MONTH, created_months);
    table.put_column(None, RESOLUTION_MONTH, resolved_months);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &str = r#"[
        {"key": "us-core", "name": "US Core", "url": "http://hl7.org/fhir/us/core"},
        {"key": "ips", "name": "International Patient Summary", "url": "http://hl7.org/fhir/uv/ips"},
        {"key": "core", "name": "FHIR Core", "url": "http://hl7.org/fhir"},
        {"key": "V2-lri", "name": "Lab Results Interface", "url": "https://www.hl7.org/implement/standards/product_brief.cfm?product_id=279"},
        {"key": "V2-other", "name": "Other V2", "url": "https://www.hl7.org/implement/standards/product_brief.cfm?product_id=999"},
        {"key": "odd", "name": "Odd One", "url": "http://example.org/odd"}
    ]"#;

    const WORKGROUPS: &str = r#"[
        {"key": "fhir-i", "name": "FHIR Infrastructure"},
        {"key": "pc", "name": "Patient Care &amp; Safety"},
        {"key": "v2mg", "name": "V2 Management Group"}
    ]"#;

    const INPUT: &str = "Issue,Created Date,Resolution Date,Reporter,Specification,WG,Summary\n\
        FHIR-1,2024-01-01T00:00:00Z,2024-01-11T00:00:00Z,alice,us-core,fhir-i,one\n\
        FHIR-2,2024-02-15T00:00:00Z,,bob,ips,pc,two\n\
        FHIR-3,2024-03-01T00:00:00Z,2024-06-04T12:00:00Z,carol,core,fhir-i,three\n\
        V2-1,2024-03-01T00:00:00Z,,dave,core,v2mg,four\n\
        V2-25638,2024-03-01T00:00:00Z,,erin,V2-other,bad,five\n\
        V2-15528,2024-03-01T00:00:00Z,,frank,odd,bad,six\n\
        V2-2,2024-03-01T00:00:00Z,,gail,V2-other,v2mg,seven\n";

    fn run(store: &mut RealmStore) -> (Table, EnhanceSummary) {
        let specs = SpecRegistry::from_json(SPECS).unwrap();
        let workgroups = WorkgroupRegistry::from_json(WORKGROUPS).unwrap();
        let mut table = Table::from_reader(INPUT.as_bytes()).unwrap();
        let summary = Enricher::new(&specs, Some(&workgroups), store)
            .enhance(&mut table)
            .unwrap();
        (table, summary)
    }

    fn cell<'t>(table: &'t Table, row: usize, column: &str) -> Option<&'t str> {
        table.get_named(row, column)
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/data/issues.csv")),
            PathBuf::from("/data/issues-enhanced.csv")
        );
        assert_eq!(
            default_output_path(Path::new("export")),
            PathBuf::from("export-enhanced")
        );
    }

    #[test]
    fn test_corrections_applied() {
        let mut store = RealmStore::open_memory().unwrap();
        let (table, summary) = run(&mut store);
        assert_eq!(summary.corrections, 2);
        assert_eq!(cell(&table, 4, SPECIFICATION), Some("V2-lri"));
        assert_eq!(cell(&table, 5, WG), Some("v2mg"));
        assert_eq!(cell(&table, 5, WG_NAME), Some("V2 Management Group"));
    }

    #[test]
    fn test_display_names_and_v2_core_override() {
        let mut store = RealmStore::open_memory().unwrap();
        let (table, _) = run(&mut store);
        assert_eq!(cell(&table, 0, SPEC_DISPLAY_NAME), Some("US Core"));
        assert_eq!(cell(&table, 2, SPEC_DISPLAY_NAME), Some("FHIR Core"));
        assert_eq!(cell(&table, 3, SPEC_DISPLAY_NAME), Some("V2 Core (V2)"));
        assert_eq!(
            cell(&table, 4, SPEC_DISPLAY_NAME),
            Some("Lab Results Interface")
        );
    }

    #[test]
    fn test_realms_inferred_and_recorded() {
        let mut store = RealmStore::open_memory().unwrap();
        let (table, summary) = run(&mut store);

        assert_eq!(cell(&table, 0, REALM), Some("United States"));
        assert_eq!(cell(&table, 1, REALM), Some("Universal"));
        assert_eq!(cell(&table, 2, REALM), Some("Universal"));
        // Product briefs resolve only from stored URL mappings.
        assert_eq!(cell(&table, 4, REALM), None);
        assert_eq!(cell(&table, 5, REALM), None);

        assert_eq!(summary.mappings_saved, 3);
        assert_eq!(store.lookup_spec("us-core"), Some("United States"));
        assert_eq!(summary.unresolved_specs, vec!["V2-lri", "V2-other", "odd"]);
        assert_eq!(summary.unresolved_urls.len(), 2);
    }

    #[test]
    fn test_stored_url_mapping_resolves_product_brief() {
        let mut store = RealmStore::open_memory().unwrap();
        store.record_url(
            "https://www.hl7.org/implement/standards/product_brief.cfm?product_id=999",
            "Universal",
        );
        store.record_spec("odd", None, "Canada");
        store.flush().unwrap();

        let (table, summary) = run(&mut store);
        assert_eq!(cell(&table, 6, REALM), Some("Universal"));
        assert_eq!(cell(&table, 5, REALM), Some("Canada"));
        assert_eq!(summary.unresolved_specs, vec!["V2-lri"]);
        assert_eq!(store.lookup_spec("V2-other"), Some("Universal"));
    }

    #[test]
    fn test_wg_name_follows_wg_column() {
        let mut store = RealmStore::open_memory().unwrap();
        let (table, summary) = run(&mut store);
        let wg = table.column(WG).unwrap();
        assert_eq!(table.column(WG_NAME), Some(wg + 1));
        assert_eq!(cell(&table, 1, WG_NAME), Some("Patient Care & Safety"));
        assert_eq!(cell(&table, 4, WG_NAME), None);
        assert_eq!(summary.wg_names, 6);
    }

    #[test]
    fn test_derived_columns() {
        let mut store = RealmStore::open_memory().unwrap();
        let (table, _) = run(&mut store);
        assert_eq!(cell(&table, 0, PRODUCT_FAMILY), Some("FHIR"));
        assert_eq!(cell(&table, 3, PRODUCT_FAMILY), Some("V2"));
        assert_eq!(cell(&table, 0, DAYS_TO_RESOLUTION), Some("10"));
        // 95.5 days rounds to three significant digits.
        assert_eq!(cell(&table, 2, DAYS_TO_RESOLUTION), Some("95.5"));
        assert_eq!(cell(&table, 1, DAYS_TO_RESOLUTION), None);
        assert_eq!(cell(&table, 1, CREATION_MONTH), Some("2024-02"));
        assert_eq!(cell(&table, 2, RESOLUTION_MONTH), Some("2024-06"));
        assert_eq!(cell(&table, 1, RESOLUTION_MONTH), None);
        // Untouched columns survive.
        assert_eq!(cell(&table, 0, "Summary"), Some("one"));
    }

    #[test]
    fn test_enhance_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("issues.csv");
        std::fs::write(&input, INPUT).unwrap();
        let output = default_output_path(&input);

        let specs = SpecRegistry::from_json(SPECS).unwrap();
        let mut store = RealmStore::open_memory().unwrap();
        let summary = enhance_file(&input, &output, &specs, None, &mut store).unwrap();
        assert_eq!(summary.rows, 7);
        assert_eq!(summary.wg_names, 0);

        let written = Table::read_csv(&output).unwrap();
        assert!(written.has_column(REALM));
        assert!(written.has_column(SPEC_DISPLAY_NAME));
        assert!(!written.has_column(WG_NAME));
        assert_eq!(written.len(), 7);
    }

    #[test]
    fn test_long_row_aborts_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("issues.csv");
        std::fs::write(
            &input,
            "Issue,Created Date,Resolution Date,Reporter,Specification\n\
             FHIR-1,2024-01-01,,alice,us-core,EXTRA\n",
        )
        .unwrap();
        let output = default_output_path(&input);

        let specs = SpecRegistry::from_json(SPECS).unwrap();
        let mut store = RealmStore::open_memory().unwrap();
        let result = enhance_file(&input, &output, &specs, None, &mut store);
        assert!(matches!(result, Err(crate::Error::RaggedRow { line: 2, .. })));
        assert!(!output.exists());
    }
}
