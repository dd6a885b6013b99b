//! Journal store: append-mostly structured entries with a full-text index.
//!
//! The `entries_fts` projection is maintained by the triggers defined in
//! [`crate::db::schema`]; every write here runs inside an `IMMEDIATE`
//! transaction, so an entry and its index row commit (or roll back) together.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::db;
use crate::error::{MemoryError, Result};
use crate::memory::types::{now_timestamp, JournalEntry, NewEntry};

const ENTRY_COLUMNS: &str = "id, created_at, session_id, thread_id, title, summary, decisions, \
                             open_loops, artifacts_json, tags_json, importance";

/// Title given to quick snippet entries.
pub const SNIPPET_TITLE: &str = "Snippet";

pub struct JournalStore {
    conn: Connection,
}

impl JournalStore {
    /// Open the journal database named by the storage config.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        Self::open_path(
            config.journal_db_path(),
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    pub fn open_path(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        Ok(Self {
            conn: db::open_journal_database(path, busy_timeout)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: db::open_journal_memory()?,
        })
    }

    /// Borrow the underlying connection. Writes made through it bypass the
    /// store's validation and transactions.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Append an entry and return its id.
    pub fn append_entry(&mut self, entry: &NewEntry) -> Result<i64> {
        validate(entry)?;
        let artifacts_json = serde_json::to_string(&entry.artifacts)?;
        let tags_json = serde_json::to_string(&entry.tags)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO entries \
             (created_at, session_id, thread_id, title, summary, decisions, open_loops, \
              artifacts_json, tags_json, importance) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                now_timestamp(),
                entry.session_id,
                entry.thread_id,
                entry.title,
                entry.summary,
                entry.decisions,
                entry.open_loops,
                artifacts_json,
                tags_json,
                entry.importance,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(id, title = %entry.title, "journal entry appended");
        Ok(id)
    }

    /// Quick drop: a `Snippet` entry whose summary is `text`. Tags default to
    /// `["snippet"]` when none are given.
    pub fn append_snippet(
        &mut self,
        text: &str,
        tags: Vec<String>,
        importance: i64,
        session_id: Option<String>,
        thread_id: Option<String>,
    ) -> Result<i64> {
        let tags = if tags.is_empty() {
            vec!["snippet".to_string()]
        } else {
            tags
        };
        let mut entry = NewEntry::new(SNIPPET_TITLE, text)
            .with_tags(tags)
            .with_artifact("snippet", serde_json::Value::String(text.to_string()));
        entry.importance = importance;
        entry.session_id = session_id;
        entry.thread_id = thread_id;
        self.append_entry(&entry)
    }

    /// Fetch a single entry by id.
    pub fn get_entry(&self, id: i64) -> Result<JournalEntry> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
                params![id],
                EntryRow::from_row,
            )
            .optional()?
            .ok_or_else(|| MemoryError::not_found("journal entry", id.to_string()))?;
        row.decode()
    }

    /// Most recent entries, highest id first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<JournalEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(
                params![i64::try_from(limit).unwrap_or(i64::MAX)],
                EntryRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EntryRow::decode).collect()
    }

    /// Rewrite an entry's content fields, keeping its id and `created_at`.
    /// The update trigger replaces the index row.
    pub fn update_entry(&mut self, id: i64, entry: &NewEntry) -> Result<JournalEntry> {
        validate(entry)?;
        let artifacts_json = serde_json::to_string(&entry.artifacts)?;
        let tags_json = serde_json::to_string(&entry.tags)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rows = tx.execute(
            "UPDATE entries SET session_id = ?1, thread_id = ?2, title = ?3, summary = ?4, \
             decisions = ?5, open_loops = ?6, artifacts_json = ?7, tags_json = ?8, importance = ?9 \
             WHERE id = ?10",
            params![
                entry.session_id,
                entry.thread_id,
                entry.title,
                entry.summary,
                entry.decisions,
                entry.open_loops,
                artifacts_json,
                tags_json,
                entry.importance,
                id,
            ],
        )?;
        if rows == 0 {
            return Err(MemoryError::not_found("journal entry", id.to_string()));
        }
        tx.commit()?;

        tracing::debug!(id, "journal entry updated");
        self.get_entry(id)
    }

    /// Remove an entry and, through the delete trigger, its index row.
    pub fn delete_entry(&mut self, id: i64) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rows = tx.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(MemoryError::not_found("journal entry", id.to_string()));
        }
        tx.commit()?;

        tracing::debug!(id, "journal entry deleted");
        Ok(())
    }
}

fn validate(entry: &NewEntry) -> Result<()> {
    if entry.importance < 1 {
        return Err(MemoryError::validation(format!(
            "importance must be at least 1, got {}",
            entry.importance
        )));
    }
    Ok(())
}

/// Raw `entries` row; JSON columns are decoded outside the row closure so
/// decode failures surface as serialization errors.
struct EntryRow {
    id: i64,
    created_at: String,
    session_id: Option<String>,
    thread_id: Option<String>,
    title: String,
    summary: String,
    decisions: String,
    open_loops: String,
    artifacts_json: String,
    tags_json: String,
    importance: i64,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            session_id: row.get(2)?,
            thread_id: row.get(3)?,
            title: row.get(4)?,
            summary: row.get(5)?,
            decisions: row.get(6)?,
            open_loops: row.get(7)?,
            artifacts_json: row.get(8)?,
            tags_json: row.get(9)?,
            importance: row.get(10)?,
        })
    }

    fn decode(self) -> Result<JournalEntry> {
        Ok(JournalEntry {
            id: self.id,
            created_at: self.created_at,
            session_id: self.session_id,
            thread_id: self.thread_id,
            title: self.title,
            summary: self.summary,
            decisions: self.decisions,
            open_loops: self.open_loops,
            artifacts: serde_json::from_str(&self.artifacts_json)?,
            tags: serde_json::from_str(&self.tags_json)?,
            importance: self.importance,
        })
    }
}
