use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// Default location of the staff roster, relative to the working directory.
pub const DEFAULT_STAFF_CONFIG: &str = "data/working/config/hl7-staff.yaml";

#[derive(Debug, Deserialize)]
struct StaffEntry {
    display_name: Option<String>,
}

/// Reporter names to leave out of community leaderboards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffList {
    names: HashSet<String>,
}

impl StaffList {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.into().trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// Parse a YAML sequence of `{display_name: ...}` entries.
    /// Entries without a display name are skipped.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let entries: Option<Vec<StaffEntry>> = serde_yaml::from_str(text)?;
        Ok(Self::from_names(
            entries
                .unwrap_or_default()
                .into_iter()
                .filter_map(|e| e.display_name),
        ))
    }

    /// Load the roster, falling back to an empty list if the file is absent
    /// or cannot be parsed.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        log::info!("Loading staff configuration from {}", path.display());
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Staff config file not found at {}", path.display());
                return Self::default();
            }
            Err(e) => {
                log::warn!("Could not read staff config file {}: {e}", path.display());
                return Self::default();
            }
        };
        match Self::from_yaml(&text) {
            Ok(list) => {
                log::debug!("Loaded {} staff names", list.len());
                list
            }
            Err(e) => {
                log::warn!("Could not load staff config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name.trim())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
