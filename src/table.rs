use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Header aliases applied before analysis: the left name is renamed to the
/// right one when the right one is not already present.
pub const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("WG", "WG Name"),
    ("Specification", "Specification Display Name"),
];

/// An in-memory, string-typed CSV table. Empty cells are treated as null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                if r.len() < width {
                    r.resize(width, String::new());
                }
                r
            })
            .collect();
        Self { headers, rows }
    }

    /// Read a CSV file. Header names are whitespace-trimmed; short rows are
    /// padded and rows longer than the header are rejected.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let table = Self::from_reader(file)?;
        log::debug!(
            "Read {} rows x {} columns from {}",
            table.len(),
            table.headers.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() > headers.len() {
                return Err(Error::RaggedRow {
                    line: record.position().map_or(0, |p| p.line()),
                    found: record.len(),
                    expected: headers.len(),
                });
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self::new(headers, rows))
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        self.to_writer(file)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush().map_err(|e| Error::io("<csv output>", e))?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Fail with `MissingColumn` naming the first absent column.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| !self.has_column(n)) {
            Some(missing) => Err(Error::MissingColumn((*missing).to_string())),
            None => Ok(()),
        }
    }

    /// Rename `from` to `to` unless `to` already exists. Returns true if renamed.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if self.has_column(to) {
            return false;
        }
        match self.column(from) {
            Some(idx) => {
                self.headers[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn apply_aliases(&mut self) {
        for (from, to) in COLUMN_ALIASES {
            if self.rename_column(from, to) {
                log::debug!("Renamed column '{from}' to '{to}'");
            }
        }
    }

    /// Cell value, or `None` if the column is absent or the cell is blank.
    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn get_named(&self, row: usize, name: &str) -> Option<&str> {
        self.column(name).and_then(|c| self.get(row, c))
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value.into();
        }
    }

    /// Insert a column at `at` (clamped to the end), or overwrite it if a
    /// column with the same name exists. Missing values become blank cells.
    pub fn put_column(&mut self, at: Option<usize>, name: &str, values: Vec<Option<String>>) {
        let mut values = values.into_iter();
        if let Some(idx) = self.column(name) {
            for row in &mut self.rows {
                row[idx] = values.next().flatten().unwrap_or_default();
            }
            return;
        }
        let idx = at.unwrap_or(self.headers.len()).min(self.headers.len());
        self.headers.insert(idx, name.to_string());
        for row in &mut self.rows {
            row.insert(idx, values.next().flatten().unwrap_or_default());
        }
    }
}
