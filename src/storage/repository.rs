use rusqlite::{params, Connection, OptionalExtension};

/// A `cache_entries` row as stored. Timestamps are RFC 3339 strings and are
/// decoded by the cache layer, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRow {
    pub cache_key: String,
    pub payload: String,
    pub cached_at: String,
    pub expires_at: String,
}

// ── Cache ──────────────────────────────────────────────────────────

pub fn get_cache_row(conn: &Connection, key: &str) -> Result<Option<CacheRow>, rusqlite::Error> {
    conn.query_row(
        "SELECT cache_key, payload, cached_at, expires_at FROM cache_entries WHERE cache_key = ?1",
        params![key],
        |row| {
            Ok(CacheRow {
                cache_key: row.get(0)?,
                payload: row.get(1)?,
                cached_at: row.get(2)?,
                expires_at: row.get(3)?,
            })
        },
    )
    .optional()
}

pub fn put_cache_row(conn: &Connection, row: &CacheRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO cache_entries (cache_key, payload, cached_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(cache_key) DO UPDATE SET
            payload=excluded.payload, cached_at=excluded.cached_at,
            expires_at=excluded.expires_at",
        params![row.cache_key, row.payload, row.cached_at, row.expires_at],
    )?;
    Ok(())
}

/// All keys with their expiry strings, for maintenance passes.
pub fn list_cache_expiries(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT cache_key, expires_at FROM cache_entries ORDER BY cache_key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

pub fn delete_cache_rows(conn: &Connection, keys: &[String]) -> Result<usize, rusqlite::Error> {
    let mut stmt = conn.prepare("DELETE FROM cache_entries WHERE cache_key = ?1")?;
    let mut deleted = 0;
    for key in keys {
        deleted += stmt.execute(params![key])?;
    }
    Ok(deleted)
}

pub fn clear_cache(conn: &Connection) -> Result<usize, rusqlite::Error> {
    conn.execute("DELETE FROM cache_entries", [])
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
