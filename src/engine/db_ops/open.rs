//! Open the store and read records back.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::Fields;

use super::{SCHEMA, WAL_PRAGMAS};

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

/// Open or create the store and ensure schema + WAL.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open database {}", path.display()))?;
    apply_wal_and_schema(&conn)?;
    Ok(conn)
}

/// Open an in-memory store with the same schema (tests and dry runs; no WAL needed).
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}

/// Number of stored records.
pub fn record_count(conn: &Connection) -> Result<usize> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
        .context("count records")?;
    Ok(n.max(0) as usize)
}

/// Fields stored for `source_id`, or None if there is no such record.
pub fn load_record(conn: &Connection, source_id: &str) -> Result<Option<Fields>> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM records WHERE source_id = ?1",
            [source_id],
            |_| Ok(()),
        )
        .optional()
        .context("look up record")?;
    if exists.is_none() {
        return Ok(None);
    }
    let mut stmt = conn.prepare("SELECT key, value FROM fields WHERE source_id = ?1")?;
    let rows = stmt.query_map([source_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut fields = Fields::new();
    for row in rows {
        let (key, value) = row?;
        fields.insert(key, value);
    }
    Ok(Some(fields))
}

/// Source ids whose record has `key` set to exactly `value`, sorted.
pub fn find_by_field(conn: &Connection, key: &str, value: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT source_id FROM fields WHERE key = ?1 AND value = ?2 ORDER BY source_id",
    )?;
    let rows = stmt.query_map([key, value], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}
