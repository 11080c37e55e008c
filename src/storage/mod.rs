pub mod repository;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use repository::SpecRealm;

/// Default store location (`~/.hl7issues/realms.db`).
pub fn default_path() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
        .join(".hl7issues");
    Ok(dir.join("realms.db"))
}

/// One line of the legacy `key,url,realm` mapping file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMapping {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub realm: String,
}

/// Persistent specification/URL → realm mappings.
///
/// Mappings are read into memory when the store is opened. New mappings are
/// staged with `record_*` and written in one transaction by [`flush`], which
/// upserts key by key so rows written by other runs survive.
///
/// [`flush`]: RealmStore::flush
pub struct RealmStore {
    conn: Connection,
    specs: HashMap<String, SpecRealm>,
    urls: HashMap<String, String>,
    pending_specs: BTreeMap<String, SpecRealm>,
    pending_urls: BTreeMap<String, String>,
}

impl RealmStore {
    /// Open the store at the default path.
    pub fn open() -> Result<Self> {
        Self::open_at(default_path()?)
    }

    /// Open the store at the given path, creating parent directories.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        log::debug!("Opening realm store at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::init(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        let migrations = Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))]);
        migrations.to_latest(&mut conn)?;
        let mut store = Self {
            conn,
            specs: HashMap::new(),
            urls: HashMap::new(),
            pending_specs: BTreeMap::new(),
            pending_urls: BTreeMap::new(),
        };
        store.load()?;
        Ok(store)
    }

    /// Replace the in-memory snapshot with the current database contents.
    /// Pending mappings are kept.
    pub fn load(&mut self) -> Result<()> {
        self.specs = repository::list_spec_realms(&self.conn)?
            .into_iter()
            .map(|m| (m.spec_key.clone(), m))
            .collect();
        self.urls = repository::list_url_realms(&self.conn)?
            .into_iter()
            .collect();
        log::debug!(
            "Loaded {} specification and {} URL realm mappings",
            self.specs.len(),
            self.urls.len()
        );
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn lookup_spec(&self, spec_key: &str) -> Option<&str> {
        self.specs
            .get(spec_key)
            .or_else(|| self.pending_specs.get(spec_key))
            .map(|m| m.realm.as_str())
    }

    pub fn lookup_url(&self, url: &str) -> Option<&str> {
        self.urls
            .get(url)
            .or_else(|| self.pending_urls.get(url))
            .map(String::as_str)
    }

    /// Stage a specification mapping; nothing is written until [`flush`](Self::flush).
    pub fn record_spec(&mut self, spec_key: &str, url: Option<&str>, realm: &str) {
        self.pending_specs.insert(
            spec_key.to_string(),
            SpecRealm {
                spec_key: spec_key.to_string(),
                url: url.filter(|u| !u.is_empty()).map(str::to_string),
                realm: realm.to_string(),
            },
        );
    }

    pub fn record_url(&mut self, url: &str, realm: &str) {
        self.pending_urls.insert(url.to_string(), realm.to_string());
    }

    pub fn pending(&self) -> usize {
        self.pending_specs.len() + self.pending_urls.len()
    }

    /// Write every staged mapping in a single transaction and fold them into
    /// the snapshot. Returns the number of mappings written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending() == 0 {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        for mapping in self.pending_specs.values() {
            repository::upsert_spec_realm(&tx, mapping)?;
        }
        for (url, realm) in &self.pending_urls {
            repository::upsert_url_realm(&tx, url, realm)?;
        }
        tx.commit()?;

        let written = self.pending();
        for (key, mut mapping) in std::mem::take(&mut self.pending_specs) {
            // The upsert keeps a stored URL when none is given.
            if mapping.url.is_none() {
                mapping.url = self.specs.get(&key).and_then(|old| old.url.clone());
            }
            self.specs.insert(key, mapping);
        }
        self.urls.extend(std::mem::take(&mut self.pending_urls));
        log::info!("Saved {written} realm mapping(s)");
        Ok(written)
    }

    /// All specification mappings, ordered by key.
    pub fn spec_mappings(&self) -> Vec<&SpecRealm> {
        let mut all: Vec<&SpecRealm> = self.specs.values().collect();
        all.sort_by(|a, b| a.spec_key.cmp(&b.spec_key));
        all
    }

    /// All URL mappings, ordered by URL.
    pub fn url_mappings(&self) -> Vec<(&str, &str)> {
        let mut all: Vec<(&str, &str)> = self
            .urls
            .iter()
            .map(|(u, r)| (u.as_str(), r.as_str()))
            .collect();
        all.sort();
        all
    }

    /// Stage every row of a legacy `key,url,realm` file and flush.
    /// Rows with a key map the specification; rows with a URL also map the URL.
    pub fn import_csv(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        log::info!("Importing realm mappings from {}", path.display());
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        self.import_reader(file)
    }

    pub fn import_reader<R: std::io::Read>(&mut self, reader: R) -> Result<usize> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        for row in rdr.deserialize() {
            let row: LegacyMapping = row?;
            if row.realm.is_empty() {
                continue;
            }
            if !row.key.is_empty() {
                self.record_spec(&row.key, Some(&row.url), &row.realm);
            }
            if !row.url.is_empty() {
                self.record_url(&row.url, &row.realm);
            }
        }
        self.flush()
    }

    /// Write every mapping in the legacy `key,url,realm` layout.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        let n = self.export_writer(file)?;
        log::info!("Exported {n} realm mapping(s) to {}", path.display());
        Ok(n)
    }

    pub fn export_writer<W: std::io::Write>(&self, writer: W) -> Result<usize> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut n = 0;
        for m in self.spec_mappings() {
            wtr.serialize(LegacyMapping {
                key: m.spec_key.clone(),
                url: m.url.clone().unwrap_or_default(),
                realm: m.realm.clone(),
            })?;
            n += 1;
        }
        // URLs already carried by a specification row are not repeated.
        for (url, realm) in self.url_mappings() {
            let covered = self
                .specs
                .values()
                .any(|m| m.url.as_deref() == Some(url) && m.realm == realm);
            if covered {
                continue;
            }
            wtr.serialize(LegacyMapping {
                key: String::new(),
                url: url.to_string(),
                realm: realm.to_string(),
            })?;
            n += 1;
        }
        wtr.flush().map_err(|e| Error::io("<csv output>", e))?;
        Ok(n)
    }
}
