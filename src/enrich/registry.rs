use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

pub const UNIVERSAL: &str = "Universal";
pub const UNITED_STATES: &str = "United States";

static RE_NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").unwrap());

/// One entry of the JIRA-Spec-Artifacts `SPECS.json` document.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecEntry {
    pub key: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
}

/// One entry of the `workgroups.json` document.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkgroupEntry {
    pub key: Option<String>,
    pub name: Option<String>,
}

/// Specification metadata keyed by specification key.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: HashMap<String, SpecEntry>,
}

impl SpecRegistry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading specification registry from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let entries: Vec<SpecEntry> = serde_json::from_str(text)?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<SpecEntry>) -> Self {
        let specs = entries
            .into_iter()
            .filter_map(|e| {
                let key = e.key.clone().filter(|k| !k.is_empty())?;
                Some((key, e))
            })
            .collect();
        Self { specs }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn display_name(&self, key: &str) -> Option<&str> {
        self.specs
            .get(key)
            .and_then(|s| s.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    pub fn url(&self, key: &str) -> Option<&str> {
        self.specs
            .get(key)
            .and_then(|s| s.url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// Workgroup display names keyed by workgroup key.
#[derive(Debug, Clone, Default)]
pub struct WorkgroupRegistry {
    names: HashMap<String, String>,
}

impl WorkgroupRegistry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading workgroup registry from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text)
    }

    /// Names are HTML-unescaped ("Patient Care &amp; Safety" -> "Patient Care & Safety").
    pub fn from_json(text: &str) -> Result<Self> {
        let entries: Vec<WorkgroupEntry> = serde_json::from_str(text)?;
        let names = entries
            .into_iter()
            .filter_map(|e| match (e.key, e.name) {
                (Some(k), Some(n)) if !k.is_empty() && !n.is_empty() => {
                    Some((k, html_unescape(&n)))
                }
                _ => None,
            })
            .collect();
        Ok(Self { names })
    }

    pub fn name(&self, key: &str) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// What a specification URL says about its realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlRealm {
    Known(&'static str),
    /// A product brief page; its realm can only come from a stored URL mapping.
    ProductBrief,
    Unrecognised,
}

/// Infer a realm from a specification's canonical URL.
///
/// - `http://hl7.org/fhir/uv/...` and `http://hl7.org/cda/stds/...` are Universal
/// - `http://hl7.org/fhir/us/...` and `http://hl7.org/cda/us/...` are United States
/// - `http://hl7.org/fhir` itself is Universal
/// - any URL with a `product_id` query parameter is a product brief
pub fn realm_from_url(input: &str) -> UrlRealm {
    let Ok(url) = url::Url::parse(input.trim()) else {
        log::debug!("Unparseable specification URL: {input}");
        return UrlRealm::Unrecognised;
    };

    if url.query_pairs().any(|(k, _)| k == "product_id") {
        return UrlRealm::ProductBrief;
    }
    if url.host_str() != Some("hl7.org") {
        return UrlRealm::Unrecognised;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["fhir"] | ["fhir", ""] => UrlRealm::Known(UNIVERSAL),
        ["fhir", "uv", _, ..] | ["cda", "stds", _, ..] => UrlRealm::Known(UNIVERSAL),
        ["fhir", "us", _, ..] | ["cda", "us", _, ..] => UrlRealm::Known(UNITED_STATES),
        _ => UrlRealm::Unrecognised,
    }
}

/// Decode the HTML entities that appear in registry names.
pub fn html_unescape(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let numeric = RE_NUMERIC_ENTITY.replace_all(input, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });
    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Round to three significant digits.
pub fn round_sig3(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let shift = 2 - value.abs().log10().floor() as i32;
    if shift >= 0 {
        let factor = 10f64.powi(shift);
        (value * factor).round() / factor
    } else {
        let factor = 10f64.powi(-shift);
        (value / factor).round() * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realm_from_url() {
        assert_eq!(
            realm_from_url("http://hl7.org/fhir/uv/ips"),
            UrlRealm::Known(UNIVERSAL)
        );
        assert_eq!(
            realm_from_url("http://hl7.org/fhir/us/core"),
            UrlRealm::Known(UNITED_STATES)
        );
        assert_eq!(
            realm_from_url("http://hl7.org/fhir"),
            UrlRealm::Known(UNIVERSAL)
        );
        assert_eq!(
            realm_from_url("http://hl7.org/cda/us/ccda"),
            UrlRealm::Known(UNITED_STATES)
        );
        assert_eq!(
            realm_from_url("http://hl7.org/cda/stds/core"),
            UrlRealm::Known(UNIVERSAL)
        );
        let brief = "https://www.hl7.org/implement/standards/product_brief.cfm?product_id=185";
        assert_eq!(realm_from_url(brief), UrlRealm::ProductBrief);
        assert_eq!(
            realm_from_url("http://hl7.org/fhir/uv"),
            UrlRealm::Unrecognised
        );
        assert_eq!(
            realm_from_url("http://example.org/fhir/us/core"),
            UrlRealm::Unrecognised
        );
        assert_eq!(realm_from_url("not a url"), UrlRealm::Unrecognised);
    }

    #[test]
    fn test_html_unescape() {
        assert_eq!(
            html_unescape("Patient Care &amp; Safety"),
            "Patient Care & Safety"
        );
        assert_eq!(
            html_unescape("a &lt;b&gt; &quot;c&quot; &#39;d&#x27;"),
            "a <b> \"c\" 'd'"
        );
        assert_eq!(html_unescape("&amp;lt;"), "&lt;");
        assert_eq!(html_unescape("plain"), "plain");
    }

    #[test]
    fn test_round_sig3() {
        assert_eq!(round_sig3(14.0), 14.0);
        assert_eq!(round_sig3(35.123), 35.1);
        assert_eq!(round_sig3(1234.5), 1230.0);
        assert_eq!(round_sig3(0.012345), 0.0123);
        assert_eq!(round_sig3(0.0), 0.0);
        assert_eq!(round_sig3(-2.567), -2.57);
    }

    #[test]
    fn test_spec_registry() {
        let reg = SpecRegistry::from_json(
            r#"[
                {"key": "us-core", "name": "US Core", "url": "http://hl7.org/fhir/us/core", "family": "FHIR"},
                {"key": "", "name": "nameless"},
                {"name": "keyless"},
                {"key": "draft"}
            ]"#,
        )
        .unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.display_name("us-core"), Some("US Core"));
        assert_eq!(reg.url("us-core"), Some("http://hl7.org/fhir/us/core"));
        assert_eq!(reg.display_name("draft"), None);
        assert_eq!(reg.url("missing"), None);
    }

    #[test]
    fn test_workgroup_registry() {
        let reg = WorkgroupRegistry::from_json(
            r#"[{"key": "pc", "name": "Patient Care &amp; Safety"}, {"key": "x"}]"#,
        )
        .unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.name("pc"), Some("Patient Care & Safety"));
    }

    #[test]
    fn test_malformed_registry_is_an_error() {
        assert!(matches!(SpecRegistry::from_json("{"), Err(Error::Json(_))));
    }
}
