use anyhow::{Context, Result};
use rusqlite::Connection;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::Record;
use crate::pipeline::Sink;

use super::{DELETE_FIELDS_SQL, INSERT_FIELD_SQL, UPSERT_RECORD_SQL};

/// Sink that writes each record into the store in its own transaction.
///
/// Owned by the collector thread only. A record with an already stored `source_id` replaces it.
pub struct SqliteSink {
    conn: Connection,
    checkpoint_on_flush: bool,
}

impl SqliteSink {
    /// Sink over a file-backed store (from [`open_db`](super::open_db)); WAL is checkpointed on flush.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            checkpoint_on_flush: true,
        }
    }

    /// Sink over an in-memory store (from [`open_db_in_memory`](super::open_db_in_memory)).
    pub fn in_memory(conn: Connection) -> Self {
        Self {
            conn,
            checkpoint_on_flush: false,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

impl Sink for SqliteSink {
    fn store(&mut self, record: &Record) -> Result<()> {
        let tx = self.conn.transaction().context("begin transaction")?;
        {
            let id = record.source_id.as_str();
            tx.execute(
                UPSERT_RECORD_SQL,
                (id, record.fields.len() as i64, now_ns()),
            )
            .context("upsert record")?;
            tx.execute(DELETE_FIELDS_SQL, [id])
                .context("clear previous fields")?;
            let mut stmt = tx.prepare(INSERT_FIELD_SQL).context("prepare insert")?;
            for (key, value) in &record.fields {
                stmt.execute((id, key.as_str(), value.as_str()))
                    .context("insert field")?;
            }
        }
        tx.commit().context("commit transaction")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.checkpoint_on_flush {
            self.conn
                .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                .context("WAL checkpoint")?;
        }
        Ok(())
    }
}
