pub mod schema;

use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Busy timeout applied when the caller does not supply one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open (or create) the record database at the given path with schema initialized.
pub fn open_record_database(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Connection> {
    let conn = open_file(path.as_ref(), busy_timeout)?;
    schema::init_record_schema(&conn)?;
    tracing::info!(path = %path.as_ref().display(), "record database initialized");
    Ok(conn)
}

/// Open (or create) the journal database at the given path with schema and
/// FTS triggers initialized.
pub fn open_journal_database(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Connection> {
    let conn = open_file(path.as_ref(), busy_timeout)?;
    schema::init_journal_schema(&conn)?;
    tracing::info!(path = %path.as_ref().display(), "journal database initialized");
    Ok(conn)
}

/// In-memory record database, used by tests and throwaway tooling.
pub fn open_record_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_record_schema(&conn)?;
    Ok(conn)
}

/// In-memory journal database.
pub fn open_journal_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::init_journal_schema(&conn)?;
    Ok(conn)
}

fn open_file(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;

    // WAL: readers don't block the single writer
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(busy_timeout)?;

    Ok(conn)
}

/// Health report for the record database.
#[derive(Debug, Serialize)]
pub struct RecordHealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub entity_count: i64,
    pub observation_count: i64,
    pub relation_count: i64,
    /// Observations whose entity row is gone. Always 0 while foreign keys are enforced.
    pub orphan_observations: i64,
}

/// Health report for the journal database.
#[derive(Debug, Serialize)]
pub struct JournalHealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub entry_count: i64,
    pub indexed_count: i64,
    /// `true` when every entry has exactly one index row and vice versa.
    pub index_in_sync: bool,
}

pub fn check_record_health(conn: &Connection) -> rusqlite::Result<RecordHealthReport> {
    let (integrity_ok, integrity_details) = integrity_check(conn)?;
    let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));

    Ok(RecordHealthReport {
        integrity_ok,
        integrity_details,
        schema_version: schema::get_schema_version(conn)?,
        entity_count: count("SELECT COUNT(*) FROM entities")?,
        observation_count: count("SELECT COUNT(*) FROM observations")?,
        relation_count: count("SELECT COUNT(*) FROM relations")?,
        orphan_observations: count(
            "SELECT COUNT(*) FROM observations o \
             LEFT JOIN entities e ON e.id = o.entity_id WHERE e.id IS NULL",
        )?,
    })
}

pub fn check_journal_health(conn: &Connection) -> rusqlite::Result<JournalHealthReport> {
    let (integrity_ok, integrity_details) = integrity_check(conn)?;
    let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));

    let entry_count = count("SELECT COUNT(*) FROM entries")?;
    let indexed_count = count("SELECT COUNT(*) FROM entries_fts")?;
    let unmatched = count(
        "SELECT (SELECT COUNT(*) FROM entries e \
                 WHERE NOT EXISTS (SELECT 1 FROM entries_fts f WHERE f.rowid = e.id)) \
              + (SELECT COUNT(*) FROM entries_fts f \
                 WHERE NOT EXISTS (SELECT 1 FROM entries e WHERE e.id = f.rowid))",
    )?;

    Ok(JournalHealthReport {
        integrity_ok,
        integrity_details,
        schema_version: schema::get_schema_version(conn)?,
        entry_count,
        indexed_count,
        index_in_sync: unmatched == 0 && entry_count == indexed_count,
    })
}

fn integrity_check(conn: &Connection) -> rusqlite::Result<(bool, String)> {
    let details: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    Ok((details == "ok", details))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_record_db_enforces_foreign_keys() {
        let conn = open_record_memory().unwrap();
        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn health_reports_are_clean_on_fresh_databases() {
        let records = open_record_memory().unwrap();
        let report = check_record_health(&records).unwrap();
        assert!(report.integrity_ok);
        assert_eq!(report.schema_version, schema::SCHEMA_VERSION);
        assert_eq!(report.entity_count, 0);
        assert_eq!(report.orphan_observations, 0);

        let journal = open_journal_memory().unwrap();
        let report = check_journal_health(&journal).unwrap();
        assert!(report.integrity_ok);
        assert!(report.index_in_sync);
        assert_eq!(report.entry_count, 0);
    }
}
