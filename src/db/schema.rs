//! SQL DDL for the record store and the journal store.
//!
//! The record database holds `entities`, `observations`, and `relations`; the
//! journal database holds `entries` plus the `entries_fts` (FTS5) projection,
//! kept in lockstep by insert/update/delete triggers. All DDL uses
//! `IF NOT EXISTS` so initialization is safe to run on every open.

use rusqlite::Connection;

/// Schema version written into `schema_meta` on first initialization.
pub const SCHEMA_VERSION: u32 = 1;

const RECORD_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    namespace TEXT NOT NULL,
    salience TEXT NOT NULL CHECK(salience IN ('foundational','active','background','archive')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(name, namespace)
);

CREATE INDEX IF NOT EXISTS idx_entities_namespace ON entities(namespace);
CREATE INDEX IF NOT EXISTS idx_entities_salience ON entities(salience);
CREATE INDEX IF NOT EXISTS idx_entities_updated ON entities(updated_at);

CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    added_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_observations_entity ON observations(entity_id);
CREATE INDEX IF NOT EXISTS idx_observations_added ON observations(added_at);

-- Endpoints are plain names; relations may point at entities that do not exist yet.
CREATE TABLE IF NOT EXISTS relations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_entity TEXT NOT NULL,
    relation_type TEXT NOT NULL,
    to_entity TEXT NOT NULL,
    namespace TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_entity, namespace);
CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_entity, namespace);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const JOURNAL_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    session_id TEXT,
    thread_id TEXT,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    decisions TEXT NOT NULL DEFAULT '',
    open_loops TEXT NOT NULL DEFAULT '',
    artifacts_json TEXT NOT NULL DEFAULT '{}',
    tags_json TEXT NOT NULL DEFAULT '[]',
    importance INTEGER NOT NULL DEFAULT 1 CHECK(importance >= 1)
);

-- Self-contained FTS5 table (not external-content) so the triggers can delete
-- by rowid without supplying the previously indexed values.
CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
    title,
    summary,
    decisions,
    open_loops,
    artifacts_text,
    tags_text
);

CREATE TRIGGER IF NOT EXISTS entries_ai AFTER INSERT ON entries BEGIN
    INSERT INTO entries_fts(rowid, title, summary, decisions, open_loops, artifacts_text, tags_text)
    VALUES (
        new.id,
        COALESCE(new.title, ''),
        COALESCE(new.summary, ''),
        COALESCE(new.decisions, ''),
        COALESCE(new.open_loops, ''),
        COALESCE(new.artifacts_json, ''),
        COALESCE(new.tags_json, '')
    );
END;

CREATE TRIGGER IF NOT EXISTS entries_ad AFTER DELETE ON entries BEGIN
    DELETE FROM entries_fts WHERE rowid = old.id;
END;

CREATE TRIGGER IF NOT EXISTS entries_au AFTER UPDATE ON entries BEGIN
    DELETE FROM entries_fts WHERE rowid = old.id;
    INSERT INTO entries_fts(rowid, title, summary, decisions, open_loops, artifacts_text, tags_text)
    VALUES (
        new.id,
        COALESCE(new.title, ''),
        COALESCE(new.summary, ''),
        COALESCE(new.decisions, ''),
        COALESCE(new.open_loops, ''),
        COALESCE(new.artifacts_json, ''),
        COALESCE(new.tags_json, '')
    );
END;

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize the record store tables. Idempotent.
pub fn init_record_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(RECORD_SCHEMA_SQL)?;
    write_schema_version(conn)
}

/// Initialize the journal tables, FTS projection, and sync triggers. Idempotent.
pub fn init_journal_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(JOURNAL_SCHEMA_SQL)?;
    write_schema_version(conn)
}

fn write_schema_version(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Read the stored schema version, `0` if absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type IN ('table','trigger') ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn record_schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_record_schema(&conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"entities".to_string()));
        assert!(tables.contains(&"observations".to_string()));
        assert!(tables.contains(&"relations".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn journal_schema_creates_fts_and_triggers() {
        let conn = Connection::open_in_memory().unwrap();
        init_journal_schema(&conn).unwrap();

        let names = table_names(&conn);
        assert!(names.contains(&"entries".to_string()));
        assert!(names.contains(&"entries_fts".to_string()));
        assert!(names.contains(&"entries_ai".to_string()));
        assert!(names.contains(&"entries_ad".to_string()));
        assert!(names.contains(&"entries_au".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_record_schema(&conn).unwrap();
        init_record_schema(&conn).unwrap(); // second call should not error

        let journal = Connection::open_in_memory().unwrap();
        init_journal_schema(&journal).unwrap();
        init_journal_schema(&journal).unwrap();
    }

    #[test]
    fn salience_check_rejects_unknown_values() {
        let conn = Connection::open_in_memory().unwrap();
        init_record_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO entities (name, entity_type, namespace, salience, created_at, updated_at) \
             VALUES ('x', 'general', 'default', 'urgent', '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
            [],
        );
        assert!(result.is_err(), "unknown salience should be rejected by CHECK constraint");
    }
}
