//! Database operations: schema, open, the SQLite sink and read helpers.

mod open;
mod sink;

pub use open::{find_by_field, load_record, open_db, open_db_in_memory, record_count};
pub use sink::SqliteSink;

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

pub(crate) const UPSERT_RECORD_SQL: &str =
    "INSERT OR REPLACE INTO records (source_id, field_count, stored_at_ns) VALUES (?1, ?2, ?3)";

pub(crate) const DELETE_FIELDS_SQL: &str = "DELETE FROM fields WHERE source_id = ?1";

pub(crate) const INSERT_FIELD_SQL: &str =
    "INSERT INTO fields (source_id, key, value) VALUES (?1, ?2, ?3)";

/// One row per record, one row per key/value pair. Keyed by source id.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    source_id TEXT PRIMARY KEY,
    field_count INTEGER NOT NULL,
    stored_at_ns INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS fields (
    source_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (source_id, key)
);
CREATE INDEX IF NOT EXISTS idx_fields_key_value ON fields(key, value);
"#;
