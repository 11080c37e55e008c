use rusqlite::{params, Connection, OptionalExtension};

/// A realm assignment for one specification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRealm {
    pub spec_key: String,
    pub url: Option<String>,
    pub realm: String,
}

// ── Specification realms ───────────────────────────────────────────

pub fn get_spec_realm(
    conn: &Connection,
    spec_key: &str,
) -> Result<Option<SpecRealm>, rusqlite::Error> {
    conn.query_row(
        "SELECT spec_key, url, realm FROM spec_realms WHERE spec_key = ?1",
        params![spec_key],
        |row| {
            Ok(SpecRealm {
                spec_key: row.get(0)?,
                url: row.get(1)?,
                realm: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Insert or update a specification's realm. A missing URL keeps any URL
/// already stored for the key.
pub fn upsert_spec_realm(conn: &Connection, mapping: &SpecRealm) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO spec_realms (spec_key, url, realm, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(spec_key) DO UPDATE SET
           url = COALESCE(excluded.url, spec_realms.url),
           realm = excluded.realm,
           updated_at = excluded.updated_at",
        params![mapping.spec_key, mapping.url, mapping.realm],
    )?;
    Ok(())
}

pub fn list_spec_realms(conn: &Connection) -> Result<Vec<SpecRealm>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT spec_key, url, realm FROM spec_realms ORDER BY spec_key")?;
    let rows = stmt.query_map([], |row| {
        Ok(SpecRealm {
            spec_key: row.get(0)?,
            url: row.get(1)?,
            realm: row.get(2)?,
        })
    })?;
    rows.collect()
}

// ── URL realms ─────────────────────────────────────────────────────

pub fn get_url_realm(conn: &Connection, url: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT realm FROM url_realms WHERE url = ?1",
        params![url],
        |row| row.get(0),
    )
    .optional()
}

pub fn upsert_url_realm(conn: &Connection, url: &str, realm: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO url_realms (url, realm, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![url, realm],
    )?;
    Ok(())
}

pub fn list_url_realms(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT url, realm FROM url_realms ORDER BY url")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
