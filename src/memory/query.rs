//! Query layer: positional query builder plus the record and journal searches.
//!
//! Filters are kept as `(clause, values)` pairs and only joined into SQL at
//! [`QueryBuilder::build`]. Column names come from this crate; caller input is
//! always bound, never interpolated.

use rusqlite::params;
use rusqlite::types::Value;
use serde::Serialize;

use crate::error::Result;
use crate::memory::journal::JournalStore;
use crate::memory::records::RecordStore;
use crate::memory::types::{Observation, Salience};

/// Bind a string as a SQL text value.
pub fn text(s: impl Into<String>) -> Value {
    Value::Text(s.into())
}

/// One predicate and the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone)]
struct Filter {
    clause: String,
    values: Vec<Value>,
}

/// Builds a `SELECT ... WHERE ... ORDER BY ... LIMIT ?` statement from a base
/// select and a list of optional filters.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    select: String,
    filters: Vec<Filter>,
    order_by: Option<String>,
    limit: Option<i64>,
}

impl QueryBuilder {
    /// `select` must not contain placeholders.
    pub fn new(select: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add a predicate. `values` bind, in order, to the `?` placeholders in `clause`.
    pub fn filter<I>(mut self, clause: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let clause = clause.into();
        let values: Vec<Value> = values.into_iter().collect();
        debug_assert_eq!(
            clause.matches('?').count(),
            values.len(),
            "placeholder count mismatch in {clause:?}"
        );
        self.filters.push(Filter { clause, values });
        self
    }

    /// Add `column IN (?, ?, ...)` with one placeholder per value. An empty
    /// set adds no predicate at all.
    pub fn filter_in(self, column: &str, values: &[String]) -> Self {
        if values.is_empty() {
            return self;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.filter(
            format!("{column} IN ({placeholders})"),
            values.iter().map(|v| text(v.as_str())),
        )
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        self
    }

    /// Render SQL and the positional parameter list.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = self.select.clone();
        let mut values = Vec::new();

        for (i, filter) in self.filters.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push('(');
            sql.push_str(&filter.clause);
            sql.push(')');
            values.extend(filter.values.iter().cloned());
        }
        if let Some(ref order) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit));
        }

        (sql, values)
    }
}

/// One entity from [`RecordStore::search_records`] with its matching observations.
#[derive(Debug, Clone, Serialize)]
pub struct EntityMatch {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub namespace: String,
    pub salience: Salience,
    pub updated_at: String,
    pub observations: Vec<Observation>,
}

/// One full-text hit from [`JournalStore::search`].
#[derive(Debug, Clone, Serialize)]
pub struct JournalHit {
    pub id: i64,
    pub created_at: String,
    pub title: String,
    /// Short excerpt with matches wrapped in `[` `]`.
    pub snippet: String,
}

impl RecordStore {
    /// Case-insensitive substring search over entity names and observation text.
    ///
    /// Returns at most `limit` distinct entities, most recently updated first.
    /// An entity whose name matches carries all of its observations; otherwise
    /// only the observations that match are attached.
    pub fn search_records(
        &self,
        query: &str,
        namespaces: &[String],
        limit: usize,
    ) -> Result<Vec<EntityMatch>> {
        let pattern = like_pattern(query);

        // The limit applies to entities, so it is enforced on this query rather
        // than on the joined observation rows.
        let (sql, values) = QueryBuilder::new(
            "SELECT e.id, e.name, e.entity_type, e.namespace, e.salience, e.updated_at FROM entities e",
        )
        .filter(
            "e.name LIKE ? ESCAPE '\\' OR EXISTS (\
                SELECT 1 FROM observations o \
                WHERE o.entity_id = e.id AND o.content LIKE ? ESCAPE '\\')",
            [text(pattern.as_str()), text(pattern.as_str())],
        )
        .filter_in("e.namespace", namespaces)
        .order_by("e.updated_at DESC, e.id DESC")
        .limit(limit)
        .build();

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let mut matches = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                Ok(EntityMatch {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    entity_type: row.get(2)?,
                    namespace: row.get(3)?,
                    salience: row.get(4)?,
                    updated_at: row.get(5)?,
                    observations: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut obs_stmt = conn.prepare(
            "SELECT o.id, o.content, o.added_at \
             FROM observations o JOIN entities e ON e.id = o.entity_id \
             WHERE o.entity_id = ?1 \
               AND (e.name LIKE ?2 ESCAPE '\\' OR o.content LIKE ?2 ESCAPE '\\') \
             ORDER BY o.added_at DESC, o.id DESC",
        )?;
        for entity in &mut matches {
            entity.observations = obs_stmt
                .query_map(params![entity.id, pattern], |row| {
                    Ok(Observation {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        added_at: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
        }

        tracing::debug!(query, results = matches.len(), "record search");
        Ok(matches)
    }
}

impl JournalStore {
    /// Full-text search over the journal, newest entries first.
    ///
    /// Each whitespace-separated word must appear somewhere in the entry
    /// (title, summary, decisions, open loops, artifacts, or tags). A blank
    /// query returns nothing.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<JournalHit>> {
        let escaped = escape_fts_query(query);
        if escaped.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn().prepare(
            "SELECT e.id, e.created_at, e.title, \
                    snippet(entries_fts, -1, '[', ']', '…', 15) \
             FROM entries_fts \
             JOIN entries e ON e.id = entries_fts.rowid \
             WHERE entries_fts MATCH ?1 \
             ORDER BY e.id DESC \
             LIMIT ?2",
        )?;
        let hits = stmt
            .query_map(
                params![escaped, i64::try_from(limit).unwrap_or(i64::MAX)],
                |row| {
                    Ok(JournalHit {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        title: row.get(2)?,
                        snippet: row.get(3)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        tracing::debug!(query, results = hits.len(), "journal search");
        Ok(hits)
    }
}

/// Wrap `query` for a literal, case-insensitive `LIKE` substring match.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Escape a user query for FTS5 MATCH syntax.
///
/// Wraps each whitespace-delimited word in double quotes so FTS5 treats them
/// as plain terms (implicit AND). Words with nothing indexable are dropped.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .map(|word| format!("\"{word}\""))
        .collect::<Vec<_>>()
        .join(" ")
}
