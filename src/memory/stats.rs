use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::memory::journal::JournalStore;
use crate::memory::query::{text, QueryBuilder};
use crate::memory::records::RecordStore;
use crate::memory::types::Salience;

/// Record store statistics, optionally narrowed to one namespace.
#[derive(Debug, Serialize)]
pub struct RecordStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub entities: u64,
    pub observations: u64,
    pub relations: u64,
    pub by_salience: BTreeMap<String, u64>,
    /// Entity count per namespace.
    pub namespaces: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Journal statistics.
#[derive(Debug, Serialize)]
pub struct JournalStats {
    pub entries: u64,
    pub indexed_rows: u64,
    /// `true` when the full-text index holds exactly one row per entry.
    pub in_sync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<String>,
}

impl RecordStore {
    pub fn stats(&self, namespace: Option<&str>) -> Result<RecordStats> {
        let conn = self.conn();
        let ns_filter: Vec<String> = namespace.map(str::to_string).into_iter().collect();

        let entities = count(
            conn,
            QueryBuilder::new("SELECT COUNT(*) FROM entities").filter_in("namespace", &ns_filter),
        )?;
        let observations = count(
            conn,
            QueryBuilder::new(
                "SELECT COUNT(*) FROM observations o JOIN entities e ON e.id = o.entity_id",
            )
            .filter_in("e.namespace", &ns_filter),
        )?;
        let relations = count(
            conn,
            QueryBuilder::new("SELECT COUNT(*) FROM relations").filter_in("namespace", &ns_filter),
        )?;

        let mut by_salience = BTreeMap::new();
        for s in [
            Salience::Foundational,
            Salience::Active,
            Salience::Background,
            Salience::Archive,
        ] {
            let n = count(
                conn,
                QueryBuilder::new("SELECT COUNT(*) FROM entities")
                    .filter("salience = ?", [text(s.as_str())])
                    .filter_in("namespace", &ns_filter),
            )?;
            by_salience.insert(s.as_str().to_string(), n);
        }

        let (sql, values) = QueryBuilder::new("SELECT namespace, COUNT(*) FROM entities")
            .filter_in("namespace", &ns_filter)
            .build();
        let mut stmt = conn.prepare(&format!("{sql} GROUP BY namespace"))?;
        let namespaces = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        let (sql, values) =
            QueryBuilder::new("SELECT MIN(created_at), MAX(updated_at) FROM entities")
                .filter_in("namespace", &ns_filter)
                .build();
        let (oldest_entity, last_updated): (Option<String>, Option<String>) = conn.query_row(
            &sql,
            rusqlite::params_from_iter(values.iter()),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(RecordStats {
            namespace: namespace.map(str::to_string),
            entities,
            observations,
            relations,
            by_salience,
            namespaces,
            oldest_entity,
            last_updated,
        })
    }
}

impl JournalStore {
    pub fn stats(&self) -> Result<JournalStats> {
        let conn = self.conn();
        let entries = count(conn, QueryBuilder::new("SELECT COUNT(*) FROM entries"))?;
        let indexed_rows = count(conn, QueryBuilder::new("SELECT COUNT(*) FROM entries_fts"))?;
        let newest_entry: Option<String> =
            conn.query_row("SELECT MAX(created_at) FROM entries", [], |row| row.get(0))?;

        Ok(JournalStats {
            entries,
            indexed_rows,
            in_sync: entries == indexed_rows,
            newest_entry,
        })
    }
}

fn count(conn: &Connection, query: QueryBuilder) -> Result<u64> {
    let (sql, values): (String, Vec<Value>) = query.build();
    let n: u64 = conn.query_row(&sql, rusqlite::params_from_iter(values.iter()), |row| {
        row.get(0)
    })?;
    Ok(n)
}
