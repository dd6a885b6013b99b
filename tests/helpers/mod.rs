#![allow(dead_code)]

use chrono::{Duration, Utc};
use companion_memory::memory::types::{format_timestamp, Salience};
use companion_memory::memory::{JournalStore, RecordStore};

/// Fresh in-memory record store with schema applied.
pub fn record_store() -> RecordStore {
    RecordStore::open_in_memory().unwrap()
}

/// Fresh in-memory journal with schema and FTS triggers applied.
pub fn journal_store() -> JournalStore {
    JournalStore::open_in_memory().unwrap()
}

/// Append an observation with the default type and salience. Returns the entity id.
pub fn observe(store: &mut RecordStore, name: &str, namespace: &str, content: &str) -> i64 {
    store
        .upsert_observation(name, namespace, content, "general", Salience::Active)
        .unwrap()
        .entity_id
}

/// Append an observation to a foundational entity. Returns the entity id.
pub fn observe_foundational(
    store: &mut RecordStore,
    name: &str,
    namespace: &str,
    entity_type: &str,
    content: &str,
) -> i64 {
    store
        .upsert_observation(name, namespace, content, entity_type, Salience::Foundational)
        .unwrap()
        .entity_id
}

/// Move every observation of `name` back by `hours`.
pub fn backdate_observations(store: &RecordStore, name: &str, hours: i64) {
    let at = format_timestamp(Utc::now() - Duration::hours(hours));
    store
        .conn()
        .execute(
            "UPDATE observations SET added_at = ?1 \
             WHERE entity_id IN (SELECT id FROM entities WHERE name = ?2)",
            rusqlite::params![at, name],
        )
        .unwrap();
}

pub fn fts_row_count(journal: &JournalStore) -> i64 {
    journal
        .conn()
        .query_row("SELECT COUNT(*) FROM entries_fts", [], |row| row.get(0))
        .unwrap()
}

pub fn entry_count(journal: &JournalStore) -> i64 {
    journal
        .conn()
        .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
        .unwrap()
}
