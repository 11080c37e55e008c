//! Markdown rendering for the analysis and backlog reports.

pub mod backlog;
pub mod resolution;

pub use backlog::{backlog_file, render_backlog_report};
pub use resolution::{analyze_file, render_resolution_report, AnalysisSummary, ResolutionReport};

use std::fmt::Write as _;

/// GitHub-style heading anchor: lowercase, spaces become hyphens, and
/// anything other than alphanumerics, `-` and `_` is dropped.
pub fn slug(heading: &str) -> String {
    let mut out = String::with_capacity(heading.len());
    for c in heading.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else if c == ' ' {
            out.push('-');
        }
    }
    out
}

/// Day count to two decimals, or `N/A`.
pub fn days(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => "N/A".to_string(),
    }
}

pub fn percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// A pipe-delimited table.
#[derive(Debug, Clone)]
pub struct MdTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MdTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "| {} |", self.headers.join(" | "));
        let rule: Vec<String> = self
            .headers
            .iter()
            .map(|h| "-".repeat(h.chars().count().max(3)))
            .collect();
        let _ = writeln!(out, "|-{}-|", rule.join("-|-"));
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
            let _ = writeln!(out, "| {} |", cells.join(" | "));
        }
    }
}

/// Accumulates a markdown document. Every level-two heading becomes a
/// table-of-contents entry when the document is rendered with a TOC.
#[derive(Debug, Default)]
pub struct MarkdownDoc {
    title: String,
    preamble: String,
    body: String,
    toc: Vec<String>,
}

impl MarkdownDoc {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Text placed between the title and the table of contents.
    pub fn preamble(&mut self, text: &str) {
        let _ = writeln!(self.preamble, "{text}\n");
    }

    pub fn section(&mut self, heading: &str) {
        self.toc.push(heading.to_string());
        let _ = writeln!(self.body, "## {heading}\n");
    }

    pub fn subsection(&mut self, heading: &str) {
        let _ = writeln!(self.body, "### {heading}\n");
    }

    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.body, "{text}");
    }

    pub fn paragraph(&mut self, text: &str) {
        let _ = writeln!(self.body, "{text}\n");
    }

    pub fn blank(&mut self) {
        self.body.push('\n');
    }

    pub fn table(&mut self, table: &MdTable) {
        table.render(&mut self.body);
        self.body.push('\n');
    }

    pub fn render(&self, with_toc: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        out.push_str(&self.preamble);
        if with_toc && !self.toc.is_empty() {
            out.push_str("## Table of Contents\n\n");
            for heading in &self.toc {
                let _ = writeln!(out, "- [{heading}](#{})", slug(heading));
            }
            out.push('\n');
        }
        out.push_str(&self.body);
        out
    }
}
